use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{click, element_text, navigate, type_into, CheckoutMode, SiteAdapter};
use crate::models::{ProductSnapshot, ProductTarget};
use crate::session::Page;
use crate::utils::error::{AppError, Result};

const LOGIN_URL: &str = "https://login.account.rakuten.com/sso/authorize?client_id=rakuten_ichiba_top_web&service_id=s245&response_type=code&scope=openid&redirect_uri=https%3A%2F%2Fwww.rakuten.co.jp%2F#/sign_in";

const SEL_NAME: &str = ".normal_reserve_item_name";
const SEL_PRICE: &str = ".value--1oSD_";
const SEL_PURCHASE_BUTTON: &str = "input[value*='購入手続き']";
const SEL_CHECKOUT_BUTTON: &str = "input[value*='ご購入手続き']";
const SEL_CONFIRM_BUTTON: &str = "input[value*='注文を確定する']";

/// Rakuten Ichiba storefront. Checkout runs per item right after the
/// cart-add, inside the monitoring worker.
pub struct RakutenAdapter;

impl RakutenAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RakutenAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SiteAdapter for RakutenAdapter {
    fn site(&self) -> &str {
        "rakuten"
    }

    fn checkout_mode(&self) -> CheckoutMode {
        CheckoutMode::PerItem
    }

    async fn login(&self, page: &Page, email: &str, password: &str) -> Result<bool> {
        info!(email, "Logging in to Rakuten");
        navigate(page, LOGIN_URL)?;

        // Two-step SSO form: user id first, password on the next screen.
        type_into(page, "#user_id", email)?;
        click(page, "button[type='submit']")?;
        type_into(page, "#password_current", password)?;
        page.tab()?.press_key("Enter").map_err(AppError::browser)?;
        page.tab()?
            .wait_until_navigated()
            .map_err(AppError::browser)?;

        // A rejected login bounces back to the sign-in fragment.
        let logged_in = !page.tab()?.get_url().contains("#/sign_in");
        if !logged_in {
            warn!(email, "Rakuten login was not accepted");
        }
        Ok(logged_in)
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

        let available = element_text(page, SEL_PURCHASE_BUTTON)?.is_some();

        Ok(Some(ProductSnapshot::new(
            &target.url,
            name,
            price,
            available,
        )))
    }

    async fn add_to_cart(&self, page: &Page) -> Result<bool> {
        match click(page, SEL_PURCHASE_BUTTON) {
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
        // Registered payment and address defaults carry the order through.
        click(page, SEL_CHECKOUT_BUTTON)?;
        click(page, SEL_CONFIRM_BUTTON)?;
        page.tab()?
            .wait_until_navigated()
            .map_err(AppError::browser)?;
        info!("Rakuten checkout submitted");
        Ok(true)
    }
}
