use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{click, element_text, navigate, type_into, CheckoutMode, SiteAdapter};
use crate::models::{ProductSnapshot, ProductTarget};
use crate::session::Page;
use crate::utils::error::{AppError, Result};

const LOGIN_URL: &str = "https://www.biccamera.com/bc/member/CSfLogin.jsp";

const SEL_NAME: &str = "#PROD-CURRENT-NAME";
const SEL_PRICE: &str = "strong[itemprop='price']";
const SEL_CART_BUTTON: &str = "input[value*='カートに入れる']";
const SEL_LOGIN_SUBMIT: &str = "#TMP-BTN-1";

/// Bic Camera storefront. Cart-based checkout: items accumulate during the
/// monitoring phase and one confirmation pass submits the whole cart.
pub struct BicCameraAdapter;

impl BicCameraAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for BicCameraAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SiteAdapter for BicCameraAdapter {
    fn site(&self) -> &str {
        "biccamera"
    }

    fn checkout_mode(&self) -> CheckoutMode {
        CheckoutMode::Batch
    }

    async fn login(&self, page: &Page, email: &str, password: &str) -> Result<bool> {
        info!(email, "Logging in to Bic Camera");
        navigate(page, LOGIN_URL)?;

        type_into(page, "input[type='text']", email)?;
        type_into(page, "input[type='password']", password)?;
        click(page, SEL_LOGIN_SUBMIT)?;
        page.tab()?
            .wait_until_navigated()
            .map_err(AppError::browser)?;

        // The site sometimes interposes an image CAPTCHA here; solving it is
        // out of scope, so a challenged login reports as rejected. Success is
        // the login form being gone.
        match element_text(page, SEL_LOGIN_SUBMIT)? {
            None => Ok(true),
            Some(_) => {
                warn!(email, "Bic Camera login was not accepted");
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

        // The cart button is only rendered for purchasable listings.
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
        // Payment and shipping come from the member profile; the flow walks
        // the cart into the order screen and confirms.
        click(page, "input[value*='カートに進む']")?;
        click(page, "input[value*='注文画面に進む']")?;
        page.tab()?
            .wait_until_navigated()
            .map_err(AppError::browser)?;
        info!("Bic Camera checkout submitted");
        Ok(true)
    }
}
