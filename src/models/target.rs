use serde::{Deserialize, Serialize};
use url::Url;

use crate::utils::error::{AppError, Result};

/// One product URL to be monitored for purchase availability.
///
/// The site-specific identifier is derived purely from the URL, so building
/// the same target twice always yields the same id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductTarget {
    pub url: String,
    pub product_id: String,
}

impl ProductTarget {
    pub fn from_url(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let parsed = Url::parse(trimmed)
            .map_err(|e| AppError::Validation(format!("Invalid product URL '{}': {}", trimmed, e)))?;

        let product_id = derive_product_id(&parsed);
        Ok(Self {
            url: trimmed.to_string(),
            product_id,
        })
    }

    /// Parses a comma-delimited URL list (the shape the accounts sheet uses)
    /// into an ordered target list. Empty cells between commas are skipped.
    pub fn parse_list(raw: &str) -> Result<Vec<Self>> {
        raw.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(Self::from_url)
            .collect()
    }
}

/// Last non-empty path segment, with query and fragment stripped. Falls back
/// to the host when the URL has no path (e.g. a bare storefront link).
fn derive_product_id(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| {
            segments
                .filter(|s| !s.is_empty())
                .last()
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| url.host_str().unwrap_or("unknown").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_id_from_path() {
        let target = ProductTarget::from_url("https://www.popmart.com/jp/products/1031").unwrap();
        assert_eq!(target.product_id, "1031");
    }

    #[test]
    fn test_product_id_ignores_query_and_fragment() {
        let target =
            ProductTarget::from_url("https://shop.example.com/item/abc123?ref=feed#top").unwrap();
        assert_eq!(target.product_id, "abc123");
    }

    #[test]
    fn test_product_id_trailing_slash() {
        let target = ProductTarget::from_url("https://shop.example.com/item/abc123/").unwrap();
        assert_eq!(target.product_id, "abc123");
    }

    #[test]
    fn test_product_id_is_deterministic() {
        let a = ProductTarget::from_url("https://shop.example.com/item/xyz").unwrap();
        let b = ProductTarget::from_url("https://shop.example.com/item/xyz").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_bare_host_falls_back_to_host() {
        let target = ProductTarget::from_url("https://shop.example.com").unwrap();
        assert_eq!(target.product_id, "shop.example.com");
    }

    #[test]
    fn test_parse_list_preserves_order_and_skips_blanks() {
        let targets = ProductTarget::parse_list(
            "https://a.example.com/p/1, https://a.example.com/p/2,, https://a.example.com/p/3",
        )
        .unwrap();
        assert_eq!(targets.len(), 3);
        assert_eq!(targets[0].product_id, "1");
        assert_eq!(targets[2].product_id, "3");
    }

    #[test]
    fn test_invalid_url_rejected() {
        assert!(ProductTarget::from_url("not-a-url").is_err());
    }
}
