use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{click, element_text, navigate, type_into, CheckoutMode, SiteAdapter};
use crate::models::{ProductSnapshot, ProductTarget};
use crate::session::Page;
use crate::utils::error::{AppError, Result};

const LOGIN_URL: &str = "https://www.popmart.com/jp/user/login";
const CART_URL: &str = "https://www.popmart.com/jp/largeShoppingCart";

// Class names are the storefront's hashed CSS module identifiers; they move
// when the site redeploys and are tracked here in one place.
const SEL_NAME: &str = "[class*='index_title__']";
const SEL_PRICE: &str = "[class*='index_price__']";
const SEL_CART_BUTTON: &str = "[class*='index_usBtn__']";
const SEL_ACCOUNT_MENU: &str = "[class*='index_userContainer__']";

/// Pop Mart JP storefront. Cart-based checkout: items accumulate in the
/// shared cart and a single checkout confirms all of them.
pub struct PopmartAdapter;

impl PopmartAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PopmartAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SiteAdapter for PopmartAdapter {
    fn site(&self) -> &str {
        "popmart"
    }

    fn checkout_mode(&self) -> CheckoutMode {
        CheckoutMode::Batch
    }

    async fn login(&self, page: &Page, email: &str, password: &str) -> Result<bool> {
        info!(email, "Logging in to Pop Mart");
        navigate(page, LOGIN_URL)?;

        // Cookie banner blocks the form when present.
        if click(page, ".policy_acceptBtn__ZNU71").is_err() {
            debug!("No cookie banner to dismiss");
        }

        type_into(page, "#email", email)?;
        click(page, "button[type='submit']")?;
        type_into(page, "#password", password)?;
        page.tab()?.press_key("Enter").map_err(AppError::browser)?;

        // The account menu only renders for an authenticated session.
        match page.tab()?.wait_for_element(SEL_ACCOUNT_MENU) {
            Ok(_) => Ok(true),
            Err(_) => {
                warn!(email, "Pop Mart login was not accepted");
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
        let price = element_text(page, SEL_PRICE)?.unwrap_or_default();
        if price.is_empty() {
            debug!(url = %target.url, "Product price not found on page");
            return Ok(None);
        }

        let cart_text = element_text(page, SEL_CART_BUTTON)?.unwrap_or_default();
        let available = cart_text.to_uppercase().contains("ADD TO CART");

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
        // Card and address are already attached to the account profile on
        // this storefront; checkout only confirms the cart.
        navigate(page, CART_URL)?;
        click(page, "[class*='index_checkOutBtn__']")?;
        click(page, "[class*='index_placeOrderBtn__']")?;
        page.tab()?
            .wait_until_navigated()
            .map_err(AppError::browser)?;
        info!("Pop Mart checkout submitted");
        Ok(true)
    }
}
