use async_trait::async_trait;
use chrono::Local;
use reqwest::Client;
use serde_json::json;

use super::{ChannelScope, NotifyChannel};
use crate::models::{OrderRecord, OutcomeStatus};
use crate::utils::error::{AppError, Result};

/// Discord webhook destination with rich embed payloads.
pub struct DiscordChannel {
    name: String,
    scope: ChannelScope,
    webhook_url: String,
    username: String,
    client: Client,
}

impl DiscordChannel {
    pub fn general(webhook_url: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            name: "discord:general".to_string(),
            scope: ChannelScope::General,
            webhook_url: webhook_url.into(),
            username: username.into(),
            client: Client::new(),
        }
    }

    pub fn for_account(
        account: impl Into<String>,
        webhook_url: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        let account = account.into();
        Self {
            name: format!("discord:{}", account),
            scope: ChannelScope::Account(account),
            webhook_url: webhook_url.into(),
            username: username.into(),
            client: Client::new(),
        }
    }

    fn create_embed(&self, record: &OrderRecord) -> serde_json::Value {
        let purchased = record.status.is_purchased();

        let mut fields = vec![json!({
            "name": "Product",
            "value": record.product.name,
            "inline": false
        })];
        if purchased && !record.product.price.is_empty() {
            fields.push(json!({
                "name": "Price",
                "value": record.product.price,
                "inline": false
            }));
        }
        fields.push(json!({
            "name": "Account",
            "value": record.account,
            "inline": true
        }));
        fields.push(json!({
            "name": "Status",
            "value": record.status.as_str(),
            "inline": true
        }));

        json!({
            "title": if purchased { "Order Placed" } else { "Order Failed" },
            "description": record.product.url,
            "color": if purchased { 0x00ff00 } else { 0xff0000 },
            "fields": fields,
            "footer": { "text": format!("{} {}", self.username, version_stamp()) },
            "timestamp": record.recorded_at.to_rfc3339(),
        })
    }

    fn create_payload(&self, record: &OrderRecord) -> serde_json::Value {
        json!({
            "username": self.username,
            "embeds": [self.create_embed(record)],
        })
    }
}

#[async_trait]
impl NotifyChannel for DiscordChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn scope(&self) -> &ChannelScope {
        &self.scope
    }

    async fn send(&self, record: &OrderRecord) -> Result<()> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&self.create_payload(record))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Notification(format!(
                "Discord webhook failed with status {}: {}",
                status, body
            )));
        }
        Ok(())
    }
}

/// Build stamp in the format the ops channel filters on, e.g. `v2026.8.28143055123`.
fn version_stamp() -> String {
    Local::now().format("v%Y.%-m.%-d%H%M%S%3f").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProductSnapshot;

    fn purchased_record() -> OrderRecord {
        let snapshot =
            ProductSnapshot::new("https://shop.example.com/p/1", "Figure", "¥2,640", true);
        OrderRecord::new("buyer@example.com", snapshot, OutcomeStatus::Purchased)
    }

    #[test]
    fn test_embed_success_shape() {
        let channel = DiscordChannel::general("https://discord.com/api/webhooks/1/x", "DROP BOT");
        let embed = channel.create_embed(&purchased_record());

        assert_eq!(embed["title"], "Order Placed");
        assert_eq!(embed["color"], 0x00ff00);
        assert_eq!(embed["description"], "https://shop.example.com/p/1");
        let fields = embed["fields"].as_array().unwrap();
        assert!(fields.iter().any(|f| f["name"] == "Price"));
    }

    #[test]
    fn test_embed_failure_omits_price() {
        let snapshot =
            ProductSnapshot::new("https://shop.example.com/p/2", "Figure", "¥2,640", true);
        let record = OrderRecord::new("buyer@example.com", snapshot, OutcomeStatus::Failed);

        let channel = DiscordChannel::general("https://discord.com/api/webhooks/1/x", "DROP BOT");
        let embed = channel.create_embed(&record);

        assert_eq!(embed["title"], "Order Failed");
        assert_eq!(embed["color"], 0xff0000);
        let fields = embed["fields"].as_array().unwrap();
        assert!(!fields.iter().any(|f| f["name"] == "Price"));
    }

    #[test]
    fn test_payload_carries_username() {
        let channel = DiscordChannel::general("https://discord.com/api/webhooks/1/x", "DROP BOT");
        let payload = channel.create_payload(&purchased_record());
        assert_eq!(payload["username"], "DROP BOT");
        assert_eq!(payload["embeds"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_account_channel_scope() {
        let channel = DiscordChannel::for_account(
            "buyer@example.com",
            "https://discord.com/api/webhooks/2/y",
            "DROP BOT",
        );
        assert!(channel.scope().applies_to("buyer@example.com"));
        assert!(!channel.scope().applies_to("other@example.com"));
    }

    #[tokio::test]
    async fn test_send_against_wiremock() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/webhooks/1/x"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let channel = DiscordChannel::general(
            format!("{}/api/webhooks/1/x", server.uri()),
            "DROP BOT",
        );
        assert!(channel.send(&purchased_record()).await.is_ok());
    }

    #[tokio::test]
    async fn test_send_maps_http_error() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let channel = DiscordChannel::general(server.uri(), "DROP BOT");
        let err = channel.send(&purchased_record()).await.unwrap_err();
        assert!(matches!(err, AppError::Notification(_)));
    }
}
