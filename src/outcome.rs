use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};

use crate::config::{NotificationsConfig, OrderLogConfig};
use crate::models::{NotificationResult, OrderRecord};
use crate::notify::{DiscordChannel, NotifyChannel};
use crate::utils::error::{AppError, Result};

const LOG_HEADER: [&str; 4] = ["Timestamp", "Product", "Price", "Status"];

/// Append-only CSV order log. One row per completed or failed purchase
/// attempt, header written once when the file is created.
pub struct OrderLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl OrderLog {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn append(&self, record: &OrderRecord) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| AppError::Fatal("order log lock poisoned".to_string()))?;

        let new_file = !self.path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if new_file {
            writer.write_record(LOG_HEADER)?;
        }
        writer.write_record([
            record.recorded_at.to_rfc3339().as_str(),
            record.product.name.as_str(),
            record.product.price.as_str(),
            record.status.as_str(),
        ])?;
        writer.flush()?;
        Ok(())
    }
}

/// Aggregation boundary for purchase outcomes: durable order-log append plus
/// best-effort notification fan-out.
pub struct OutcomeSink {
    log: OrderLog,
    channels: Vec<Box<dyn NotifyChannel>>,
}

impl OutcomeSink {
    pub fn new(log: OrderLog, channels: Vec<Box<dyn NotifyChannel>>) -> Self {
        Self { log, channels }
    }

    /// Builds the sink from configuration: the general webhook channel plus
    /// one channel per configured account webhook.
    pub fn from_config(
        order_log: &OrderLogConfig,
        notifications: &NotificationsConfig,
    ) -> Result<Self> {
        let log = OrderLog::new(&order_log.path)?;
        let discord = &notifications.discord;

        let mut channels: Vec<Box<dyn NotifyChannel>> = Vec::new();
        match &discord.webhook_url {
            Some(url) => channels.push(Box::new(DiscordChannel::general(url, &discord.username))),
            None => warn!("Discord webhook URL not configured, general notifications disabled"),
        }
        for (account, url) in &discord.account_webhooks {
            channels.push(Box::new(DiscordChannel::for_account(
                account.to_lowercase(),
                url,
                &discord.username,
            )));
        }

        Ok(Self::new(log, channels))
    }

    /// Durable append. This is the source of truth for the batch outcome;
    /// notification delivery never touches it.
    pub fn record(&self, record: &OrderRecord) -> Result<()> {
        self.log.append(record)?;
        info!(
            account = %record.account,
            product = %record.product.name,
            status = record.status.as_str(),
            "Order recorded"
        );
        Ok(())
    }

    /// Fans the record out to every channel whose scope covers the account.
    /// Channels are attempted independently; one failure never suppresses
    /// delivery to the others, and no failure here escalates.
    pub async fn notify(&self, record: &OrderRecord) -> Vec<NotificationResult> {
        let mut results = Vec::new();
        for channel in self
            .channels
            .iter()
            .filter(|c| c.scope().applies_to(&record.account))
        {
            let result = match channel.send(record).await {
                Ok(()) => NotificationResult {
                    channel: channel.name().to_string(),
                    success: true,
                    error: None,
                },
                Err(e) => {
                    warn!(channel = channel.name(), "Notification failed: {}", e);
                    NotificationResult {
                        channel: channel.name().to_string(),
                        success: false,
                        error: Some(e.to_string()),
                    }
                }
            };
            results.push(result);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OutcomeStatus, ProductSnapshot};
    use crate::notify::ChannelScope;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct StubChannel {
        name: String,
        scope: ChannelScope,
        fail: bool,
        sent: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl NotifyChannel for StubChannel {
        fn name(&self) -> &str {
            &self.name
        }

        fn scope(&self) -> &ChannelScope {
            &self.scope
        }

        async fn send(&self, _record: &OrderRecord) -> crate::utils::error::Result<()> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(AppError::Notification("boom".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn purchased_record(account: &str) -> OrderRecord {
        let snapshot =
            ProductSnapshot::new("https://shop.example.com/p/1", "Figure", "¥2,640", true);
        OrderRecord::new(account, snapshot, OutcomeStatus::Purchased)
    }

    fn temp_log() -> (tempfile::TempDir, OrderLog) {
        let dir = tempfile::tempdir().unwrap();
        let log = OrderLog::new(dir.path().join("orders.csv")).unwrap();
        (dir, log)
    }

    #[test]
    fn test_order_log_appends_with_header_once() {
        let (dir, log) = temp_log();
        log.append(&purchased_record("a@example.com")).unwrap();
        log.append(&purchased_record("b@example.com")).unwrap();

        let contents = std::fs::read_to_string(dir.path().join("orders.csv")).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Timestamp,Product,Price,Status");
        assert!(lines[1].contains("Purchased"));
    }

    #[tokio::test]
    async fn test_channel_failure_does_not_suppress_others() {
        let (_dir, log) = temp_log();
        let first_sent = Arc::new(AtomicUsize::new(0));
        let second_sent = Arc::new(AtomicUsize::new(0));

        let sink = OutcomeSink::new(
            log,
            vec![
                Box::new(StubChannel {
                    name: "failing".to_string(),
                    scope: ChannelScope::General,
                    fail: true,
                    sent: first_sent.clone(),
                }),
                Box::new(StubChannel {
                    name: "working".to_string(),
                    scope: ChannelScope::General,
                    fail: false,
                    sent: second_sent.clone(),
                }),
            ],
        );

        let results = sink.notify(&purchased_record("a@example.com")).await;
        assert_eq!(results.len(), 2);
        assert!(!results[0].success);
        assert!(results[1].success);
        assert_eq!(first_sent.load(Ordering::SeqCst), 1);
        assert_eq!(second_sent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_notification_failure_keeps_recorded_row() {
        let (dir, log) = temp_log();
        let sink = OutcomeSink::new(
            log,
            vec![Box::new(StubChannel {
                name: "failing".to_string(),
                scope: ChannelScope::General,
                fail: true,
                sent: Arc::new(AtomicUsize::new(0)),
            })],
        );

        let record = purchased_record("a@example.com");
        sink.record(&record).unwrap();
        let results = sink.notify(&record).await;
        assert!(!results[0].success);

        let contents = std::fs::read_to_string(dir.path().join("orders.csv")).unwrap();
        assert!(contents.contains("Figure"));
    }

    #[tokio::test]
    async fn test_account_channel_only_fires_for_its_owner() {
        let (_dir, log) = temp_log();
        let sent = Arc::new(AtomicUsize::new(0));
        let sink = OutcomeSink::new(
            log,
            vec![Box::new(StubChannel {
                name: "discord:a@example.com".to_string(),
                scope: ChannelScope::Account("a@example.com".to_string()),
                fail: false,
                sent: sent.clone(),
            })],
        );

        let results = sink.notify(&purchased_record("other@example.com")).await;
        assert!(results.is_empty());
        assert_eq!(sent.load(Ordering::SeqCst), 0);

        let results = sink.notify(&purchased_record("a@example.com")).await;
        assert_eq!(results.len(), 1);
        assert_eq!(sent.load(Ordering::SeqCst), 1);
    }
}
