use serde::{Deserialize, Serialize};

use super::target::ProductTarget;

/// One buyer account as read from the accounts sheet.
///
/// Immutable for the duration of one processing cycle; the core never writes
/// back to it. The card and address fields are references understood by the
/// storefront's checkout flow, not raw payment data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub email: String,
    pub password: String,
    pub card: String,
    pub address: String,
    pub targets: Vec<ProductTarget>,
}

impl Account {
    pub fn new(
        email: impl Into<String>,
        password: impl Into<String>,
        card: impl Into<String>,
        address: impl Into<String>,
        targets: Vec<ProductTarget>,
    ) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            card: card.into(),
            address: address.into(),
            targets,
        }
    }
}
