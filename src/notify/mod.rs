pub mod discord;

use async_trait::async_trait;

use crate::models::OrderRecord;
use crate::utils::error::Result;

pub use discord::DiscordChannel;

/// Who a channel delivers for: everyone, or one account's owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelScope {
    General,
    Account(String),
}

impl ChannelScope {
    pub fn applies_to(&self, account: &str) -> bool {
        match self {
            ChannelScope::General => true,
            ChannelScope::Account(email) => email.eq_ignore_ascii_case(account),
        }
    }
}

/// One push-notification destination. Delivery is best-effort and
/// fire-and-forget from the core's perspective.
#[async_trait]
pub trait NotifyChannel: Send + Sync {
    fn name(&self) -> &str;
    fn scope(&self) -> &ChannelScope;
    async fn send(&self, record: &OrderRecord) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_general_scope_applies_to_everyone() {
        assert!(ChannelScope::General.applies_to("anyone@example.com"));
    }

    #[test]
    fn test_account_scope_is_case_insensitive() {
        let scope = ChannelScope::Account("Buyer@Example.com".to_string());
        assert!(scope.applies_to("buyer@example.com"));
        assert!(!scope.applies_to("other@example.com"));
    }
}
