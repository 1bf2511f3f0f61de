use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of one product check: produced fresh on every check, never cached
/// across checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub url: String,
    pub name: String,
    /// Price as displayed by the storefront, raw text (e.g. "¥2,640").
    pub price: String,
    pub available: bool,
    pub checked_at: DateTime<Utc>,
}

impl ProductSnapshot {
    pub fn new(url: impl Into<String>, name: impl Into<String>, price: impl Into<String>, available: bool) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
            price: price.into(),
            available,
            checked_at: Utc::now(),
        }
    }
}
