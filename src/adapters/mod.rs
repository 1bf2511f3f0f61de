pub mod biccamera;
pub mod popmart;
pub mod rakuten;
pub mod yodobashi;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use scraper::{Html, Selector};
use std::sync::Arc;

use crate::models::{ProductSnapshot, ProductTarget};
use crate::session::Page;
use crate::utils::error::{AppError, Result};

pub use biccamera::BicCameraAdapter;
pub use popmart::PopmartAdapter;
pub use rakuten::RakutenAdapter;
pub use yodobashi::YodobashiAdapter;

/// Whether a storefront checks out once per cart at the end of a batch, or
/// immediately per item inside the monitoring loop. Declared by the adapter;
/// the core never infers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutMode {
    /// All cart-adds first, then a single checkout call on the primary page.
    Batch,
    /// Checkout runs inside the worker right after a successful cart-add.
    PerItem,
}

/// Storefront capability set: login, product check, cart, checkout.
///
/// Every call may fail; callers treat any error as a failed step for the
/// account or target at hand, never as a process fault.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SiteAdapter: Send + Sync {
    fn site(&self) -> &str;
    fn checkout_mode(&self) -> CheckoutMode;

    /// Returns false on a rejected login; errors mean the flow itself broke.
    async fn login(&self, page: &Page, email: &str, password: &str) -> Result<bool>;

    /// One fresh check of the target. `None` means the product page did not
    /// yield usable product information.
    async fn check_product(
        &self,
        page: &Page,
        target: &ProductTarget,
    ) -> Result<Option<ProductSnapshot>>;

    async fn add_to_cart(&self, page: &Page) -> Result<bool>;

    async fn checkout(&self, page: &Page, card: &str, address: &str) -> Result<bool>;
}

/// Adapter lookup by configured site name.
pub fn for_site(site: &str) -> Result<Arc<dyn SiteAdapter>> {
    match site.to_ascii_lowercase().as_str() {
        "popmart" => Ok(Arc::new(PopmartAdapter::new())),
        "yodobashi" => Ok(Arc::new(YodobashiAdapter::new())),
        "biccamera" => Ok(Arc::new(BicCameraAdapter::new())),
        "rakuten" => Ok(Arc::new(RakutenAdapter::new())),
        other => Err(AppError::Validation(format!(
            "Unknown site adapter: {}",
            other
        ))),
    }
}

/// Navigates the page and waits for the load to settle.
pub(crate) fn navigate(page: &Page, url: &str) -> Result<()> {
    let tab = page.tab()?;
    tab.navigate_to(url).map_err(AppError::browser)?;
    tab.wait_until_navigated().map_err(AppError::browser)?;
    Ok(())
}

/// First text match for a CSS selector in the page's current content, parsed
/// out-of-browser so a missing element is a plain `None` rather than a wait
/// timeout.
pub(crate) fn element_text(page: &Page, selector: &str) -> Result<Option<String>> {
    let tab = page.tab()?;
    let html = tab.get_content().map_err(AppError::browser)?;
    let document = Html::parse_document(&html);
    let css_selector = Selector::parse(selector)
        .map_err(|e| AppError::Validation(format!("Invalid CSS selector '{}': {:?}", selector, e)))?;

    Ok(document.select(&css_selector).next().map(|element| {
        element
            .text()
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string()
    }))
}

/// Waits for an element and clicks it.
pub(crate) fn click(page: &Page, selector: &str) -> Result<()> {
    let tab = page.tab()?;
    let element = tab.wait_for_element(selector).map_err(AppError::browser)?;
    element.click().map_err(AppError::browser)?;
    Ok(())
}

/// Waits for an input and types into it.
pub(crate) fn type_into(page: &Page, selector: &str, text: &str) -> Result<()> {
    let tab = page.tab()?;
    let element = tab.wait_for_element(selector).map_err(AppError::browser)?;
    element.click().map_err(AppError::browser)?;
    element.type_into(text).map_err(AppError::browser)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_site_known_adapters() {
        assert_eq!(for_site("popmart").unwrap().site(), "popmart");
        assert_eq!(for_site("Yodobashi").unwrap().site(), "yodobashi");
        assert_eq!(for_site("biccamera").unwrap().site(), "biccamera");
        assert_eq!(for_site("rakuten").unwrap().site(), "rakuten");
    }

    #[test]
    fn test_for_site_unknown_rejected() {
        assert!(for_site("amazon").is_err());
    }

    #[test]
    fn test_checkout_modes_declared_per_adapter() {
        assert_eq!(
            for_site("popmart").unwrap().checkout_mode(),
            CheckoutMode::Batch
        );
        assert_eq!(
            for_site("yodobashi").unwrap().checkout_mode(),
            CheckoutMode::PerItem
        );
        assert_eq!(
            for_site("biccamera").unwrap().checkout_mode(),
            CheckoutMode::Batch
        );
        assert_eq!(
            for_site("rakuten").unwrap().checkout_mode(),
            CheckoutMode::PerItem
        );
    }

    #[tokio::test]
    async fn test_detached_page_fails_cleanly() {
        let page = crate::session::Session::detached().primary_page();
        let adapter = PopmartAdapter::new();
        let target = ProductTarget::from_url("https://www.popmart.com/jp/products/1031").unwrap();
        assert!(adapter.check_product(&page, &target).await.is_err());
    }
}
