use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info, warn};

use super::{click, element_text, navigate, type_into, CheckoutMode, SiteAdapter};
use crate::models::{ProductSnapshot, ProductTarget};
use crate::session::Page;
use crate::utils::error::{AppError, Result};

const LOGIN_URL: &str = "https://order.yodobashi.com/yc/login/index.html";
const CART_URL: &str = "https://order.yodobashi.com/yc/shoppingcart/index.html";

const SEL_NAME: &str = "#products_maintitle";
const SEL_PRICE: &str = ".productPrice";
const SEL_CART_BUTTON: &str = ".js_addLatestSalesOrder";
const SEL_LOGOUT_LINK: &str = "a[href*='logout']";

/// Yodobashi storefront. Checkout is per item: the flow is completed for
/// each product right after it lands in the cart, so a sold-out sibling
/// never holds a secured item hostage.
pub struct YodobashiAdapter;

impl YodobashiAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for YodobashiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SiteAdapter for YodobashiAdapter {
    fn site(&self) -> &str {
        "yodobashi"
    }

    fn checkout_mode(&self) -> CheckoutMode {
        CheckoutMode::PerItem
    }

    async fn login(&self, page: &Page, email: &str, password: &str) -> Result<bool> {
        info!(email, "Logging in to Yodobashi");
        navigate(page, LOGIN_URL)?;

        type_into(page, "#memberId", email)?;
        type_into(page, "#password", password)?;
        click(page, "#js_i_login0")?;
        page.tab()?
            .wait_until_navigated()
            .map_err(AppError::browser)?;

        // A logout link is only present once the member session is live.
        match page.tab()?.wait_for_element(SEL_LOGOUT_LINK) {
            Ok(_) => Ok(true),
            Err(_) => {
                warn!(email, "Yodobashi login was not accepted");
                Ok(false)
            }
        }
    }

    async fn check_product(
        &self,
        page: &Page,
        target: &ProductTarget,
    ) -> Result<Option<ProductSnapshot>> {
        navigate(page, &target.url)?;

        let name = match element_text(page, SEL_NAME)? {
            Some(name) if !name.is_empty() => name,
            _ => {
                debug!(url = %target.url, "Product name not found on page");
                return Ok(None);
            }
        };

        let raw_price = element_text(page, SEL_PRICE)?.unwrap_or_default();
        let price = normalize_price(&raw_price);
        if price.is_empty() {
            debug!(url = %target.url, "Product price not found on page");
            return Ok(None);
        }

        // The cart button disappears entirely for out-of-stock listings.
        let available = element_text(page, SEL_CART_BUTTON)?.is_some();

        Ok(Some(ProductSnapshot::new(
            &target.url,
            name,
            price,
            available,
        )))
    }

    async fn add_to_cart(&self, page: &Page) -> Result<bool> {
        match click(page, SEL_CART_BUTTON) {
            Ok(()) => {
                info!("Product added to cart");
                Ok(true)
            }
            Err(e) => {
                warn!("Add to cart failed: {}", e);
                Ok(false)
            }
        }
    }

    async fn checkout(&self, page: &Page, _card: &str, _address: &str) -> Result<bool> {
        // Payment and shipping fall back to the account's registered
        // defaults; the flow only confirms them.
        navigate(page, CART_URL)?;
        click(page, "#js_m_orderBtn")?;
        click(page, "#js_c_nextBtn")?;
        click(page, "#js_c_orderBtn")?;
        page.tab()?
            .wait_until_navigated()
            .map_err(AppError::browser)?;
        info!("Yodobashi checkout submitted");
        Ok(true)
    }
}

/// Collapses the storefront's price markup ("¥2,640 （税込）, 10% 還元")
/// down to the leading currency amount.
fn normalize_price(raw: &str) -> String {
    let re = Regex::new(r"[¥￥][\d,]+").expect("static regex");
    re.find(raw)
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| raw.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_price_extracts_leading_amount() {
        assert_eq!(normalize_price("¥2,640 （税込）10%還元"), "¥2,640");
    }

    #[test]
    fn test_normalize_price_passes_through_plain_text() {
        assert_eq!(normalize_price(" 2640 JPY "), "2640 JPY");
    }
}
