use std::sync::Arc;
use tracing::{error, info};

use crate::adapters::SiteAdapter;
use crate::config::MonitorConfig;
use crate::models::{Account, OrderRecord};
use crate::orchestrator::AccountOrchestrator;
use crate::outcome::OutcomeSink;
use crate::session::SessionProvider;

/// Top-level batch driver. Accounts are processed strictly sequentially, so
/// at most one session is alive at any time, and one account's failure never
/// aborts the batch.
pub struct CampaignRunner {
    orchestrator: AccountOrchestrator,
}

impl CampaignRunner {
    pub fn new(
        provider: Arc<dyn SessionProvider>,
        adapter: Arc<dyn SiteAdapter>,
        sink: Arc<OutcomeSink>,
        monitor_config: MonitorConfig,
    ) -> Self {
        Self {
            orchestrator: AccountOrchestrator::new(provider, adapter, sink, monitor_config),
        }
    }

    /// Runs every account to completion and returns the aggregated order
    /// records. No retry across accounts is attempted; a skipped account
    /// simply contributes no records.
    pub async fn run(&self, accounts: &[Account]) -> Vec<OrderRecord> {
        let mut all_records = Vec::new();

        for account in accounts {
            info!(account = %account.email, targets = account.targets.len(), "Processing account");
            match self.orchestrator.process(account).await {
                Ok(mut records) => {
                    info!(
                        account = %account.email,
                        purchased = records.iter().filter(|r| r.status.is_purchased()).count(),
                        "Account finished"
                    );
                    all_records.append(&mut records);
                }
                Err(e) => {
                    error!(account = %account.email, "Account processing failed: {}", e);
                    continue;
                }
            }
        }

        all_records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{CheckoutMode, MockSiteAdapter};
    use crate::models::{ProductSnapshot, ProductTarget};
    use crate::outcome::OrderLog;
    use crate::session::Session;
    use crate::utils::error::{AppError, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedProvider {
        acquires: AtomicUsize,
        releases: AtomicUsize,
        fail_on: Vec<usize>,
    }

    impl ScriptedProvider {
        fn new(fail_on: Vec<usize>) -> Self {
            Self {
                acquires: AtomicUsize::new(0),
                releases: AtomicUsize::new(0),
                fail_on,
            }
        }
    }

    #[async_trait]
    impl SessionProvider for ScriptedProvider {
        async fn acquire(&self) -> Result<Session> {
            let attempt = self.acquires.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on.contains(&attempt) {
                return Err(AppError::Resource("launch failed".to_string()));
            }
            Ok(Session::detached())
        }

        async fn release(&self, session: &Session) {
            session.teardown();
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn test_sink() -> (tempfile::TempDir, Arc<OutcomeSink>) {
        let dir = tempfile::tempdir().unwrap();
        let log = OrderLog::new(dir.path().join("orders.csv")).unwrap();
        (dir, Arc::new(OutcomeSink::new(log, Vec::new())))
    }

    fn accounts(n: usize) -> Vec<Account> {
        (0..n)
            .map(|i| {
                Account::new(
                    format!("buyer{}@example.com", i),
                    "pw",
                    "card",
                    "addr",
                    ProductTarget::parse_list(&format!("https://shop.example.com/p/{}", i))
                        .unwrap(),
                )
            })
            .collect()
    }

    fn runner(provider: Arc<ScriptedProvider>, adapter: MockSiteAdapter) -> (tempfile::TempDir, CampaignRunner) {
        let (dir, sink) = test_sink();
        let runner = CampaignRunner::new(
            provider,
            Arc::new(adapter),
            sink,
            MonitorConfig {
                pool_width: 2,
                grace_period_secs: 1,
                kill_timeout_secs: 1,
            },
        );
        (dir, runner)
    }

    #[tokio::test]
    async fn test_auth_failure_skips_only_that_account() {
        let provider = Arc::new(ScriptedProvider::new(Vec::new()));

        let login_calls = Arc::new(AtomicUsize::new(0));
        let login_calls_in_mock = Arc::clone(&login_calls);
        let mut adapter = MockSiteAdapter::new();
        adapter.expect_login().returning(move |_, email, _| {
            login_calls_in_mock.fetch_add(1, Ordering::SeqCst);
            // Second account's credentials are rejected.
            Ok(email != "buyer1@example.com")
        });
        adapter.expect_check_product().returning(|_, target| {
            Ok(Some(ProductSnapshot::new(
                &target.url,
                &target.product_id,
                "¥1,000",
                true,
            )))
        });
        adapter.expect_add_to_cart().returning(|_| Ok(true));
        adapter
            .expect_checkout_mode()
            .return_const(CheckoutMode::PerItem);
        adapter.expect_checkout().returning(|_, _, _| Ok(true));

        let (_dir, runner) = runner(Arc::clone(&provider), adapter);
        let records = runner.run(&accounts(3)).await;

        assert_eq!(login_calls.load(Ordering::SeqCst), 3);
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.account != "buyer1@example.com"));
        // Every handed-out session was released exactly once.
        assert_eq!(provider.acquires.load(Ordering::SeqCst), 3);
        assert_eq!(provider.releases.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_acquire_failure_mid_batch_does_not_stop_later_accounts() {
        // Account 2 of 3 cannot get a session; account 3 still runs.
        let provider = Arc::new(ScriptedProvider::new(vec![2]));

        let mut adapter = MockSiteAdapter::new();
        adapter.expect_login().returning(|_, _, _| Ok(true));
        adapter.expect_check_product().returning(|_, _| Ok(None));
        adapter
            .expect_checkout_mode()
            .return_const(CheckoutMode::Batch);

        let (_dir, runner) = runner(Arc::clone(&provider), adapter);
        let records = runner.run(&accounts(3)).await;

        assert!(records.is_empty());
        assert_eq!(provider.acquires.load(Ordering::SeqCst), 3);
        // Only the two successful acquisitions were released.
        assert_eq!(provider.releases.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_account_list_returns_nothing() {
        let provider = Arc::new(ScriptedProvider::new(Vec::new()));
        let mut adapter = MockSiteAdapter::new();
        adapter.expect_login().never();

        let (_dir, runner) = runner(provider, adapter);
        assert!(runner.run(&[]).await.is_empty());
    }
}
