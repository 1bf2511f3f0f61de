use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::adapters::{CheckoutMode, SiteAdapter};
use crate::config::MonitorConfig;
use crate::models::{Account, OrderRecord};
use crate::outcome::OutcomeSink;
use crate::pool::MonitoringPool;
use crate::session::{Session, SessionProvider};
use crate::utils::error::{AppError, Result};

/// Lifecycle phases of one account's processing cycle. Done and Failed are
/// terminal; there are no retries within one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Acquiring,
    Authenticating,
    Monitoring,
    Releasing,
    Done,
    Failed,
}

/// Drives one account through acquire -> authenticate -> monitor -> release.
///
/// The session is released on every exit path: acquire failure, rejected
/// login, monitoring faults, all of them funnel through the same release
/// point before the result propagates.
pub struct AccountOrchestrator {
    provider: Arc<dyn SessionProvider>,
    adapter: Arc<dyn SiteAdapter>,
    sink: Arc<OutcomeSink>,
    pool: MonitoringPool,
}

impl AccountOrchestrator {
    pub fn new(
        provider: Arc<dyn SessionProvider>,
        adapter: Arc<dyn SiteAdapter>,
        sink: Arc<OutcomeSink>,
        monitor_config: MonitorConfig,
    ) -> Self {
        Self {
            provider,
            adapter,
            sink,
            pool: MonitoringPool::new(monitor_config),
        }
    }

    pub async fn process(&self, account: &Account) -> Result<Vec<OrderRecord>> {
        let mut phase = Phase::Idle;
        debug!(account = %account.email, ?phase, "Starting account cycle");

        phase = Phase::Acquiring;
        let session = match self.provider.acquire().await {
            Ok(session) => Arc::new(session),
            Err(e) => {
                // Nothing was handed out, so releasing is a no-op; the
                // account is skipped and the batch moves on.
                error!(account = %account.email, ?phase, "Session acquisition failed: {}", e);
                return Err(AppError::Resource(format!(
                    "could not acquire session for {}: {}",
                    account.email, e
                )));
            }
        };

        let result = self.run_with_session(account, &session, &mut phase).await;

        debug!(account = %account.email, from = ?phase, to = ?Phase::Releasing, "Releasing session");
        self.provider.release(&session).await;

        let terminal = if result.is_ok() { Phase::Done } else { Phase::Failed };
        info!(account = %account.email, phase = ?terminal, "Account cycle finished");
        result
    }

    async fn run_with_session(
        &self,
        account: &Account,
        session: &Arc<Session>,
        phase: &mut Phase,
    ) -> Result<Vec<OrderRecord>> {
        *phase = Phase::Authenticating;
        let logged_in = self
            .adapter
            .login(&session.primary_page(), &account.email, &account.password)
            .await?;
        if !logged_in {
            return Err(AppError::Auth {
                account: account.email.clone(),
            });
        }

        *phase = Phase::Monitoring;
        let account = Arc::new(account.clone());
        let records = self
            .pool
            .run(&account, &account.targets, session, &self.adapter, &self.sink)
            .await;

        // Cart-based storefronts confirm everything with one checkout on the
        // primary page, strictly after all cart-adds have finished.
        if self.adapter.checkout_mode() == CheckoutMode::Batch
            && records.iter().any(|r| r.status.is_purchased())
        {
            match self
                .adapter
                .checkout(&session.primary_page(), &account.card, &account.address)
                .await
            {
                Ok(true) => info!(account = %account.email, "Batch checkout confirmed"),
                Ok(false) => {
                    warn!(account = %account.email, "Batch checkout was not completed")
                }
                Err(e) => warn!(account = %account.email, "Batch checkout failed: {}", e),
            }
        }

        Ok(records)
    }
}
