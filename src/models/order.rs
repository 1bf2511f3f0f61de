use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::snapshot::ProductSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeStatus {
    Purchased,
    Failed,
    Skipped,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Purchased => "Purchased",
            OutcomeStatus::Failed => "Failed",
            OutcomeStatus::Skipped => "Skipped",
        }
    }

    pub fn is_purchased(&self) -> bool {
        matches!(self, OutcomeStatus::Purchased)
    }
}

/// Append-only record of one completed or failed purchase attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: Uuid,
    pub account: String,
    pub product: ProductSnapshot,
    pub status: OutcomeStatus,
    pub recorded_at: DateTime<Utc>,
}

impl OrderRecord {
    pub fn new(account: impl Into<String>, product: ProductSnapshot, status: OutcomeStatus) -> Self {
        Self {
            id: Uuid::new_v4(),
            account: account.into(),
            product,
            status,
            recorded_at: Utc::now(),
        }
    }
}

/// Per-channel delivery outcome. Not persisted, used only for logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationResult {
    pub channel: String,
    pub success: bool,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_as_str_matches_log_format() {
        assert_eq!(OutcomeStatus::Purchased.as_str(), "Purchased");
        assert_eq!(OutcomeStatus::Failed.as_str(), "Failed");
        assert_eq!(OutcomeStatus::Skipped.as_str(), "Skipped");
    }

    #[test]
    fn test_order_record_carries_account_identity() {
        let snapshot = ProductSnapshot::new("https://s.example.com/p/1", "Figure", "¥2,640", true);
        let record = OrderRecord::new("a@example.com", snapshot, OutcomeStatus::Purchased);
        assert_eq!(record.account, "a@example.com");
        assert!(record.status.is_purchased());
    }
}
