use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::adapters::{CheckoutMode, SiteAdapter};
use crate::config::MonitorConfig;
use crate::models::{Account, OrderRecord, OutcomeStatus, ProductSnapshot, ProductTarget};
use crate::outcome::OutcomeSink;
use crate::session::Session;
use crate::utils::error::Result;

/// Bounded worker pool that fans one account's product targets across W
/// concurrent workers sharing a single session.
///
/// Dispatch runs over one atomically advanced cursor, so each target is
/// claimed by exactly one worker: no duplicate dispatch, no omission. The
/// pool returns only after every target has been processed or failed.
pub struct MonitoringPool {
    config: MonitorConfig,
}

impl MonitoringPool {
    pub fn new(config: MonitorConfig) -> Self {
        Self { config }
    }

    pub async fn run(
        &self,
        account: &Arc<Account>,
        targets: &[ProductTarget],
        session: &Arc<Session>,
        adapter: &Arc<dyn SiteAdapter>,
        sink: &Arc<OutcomeSink>,
    ) -> Vec<OrderRecord> {
        if targets.is_empty() {
            return Vec::new();
        }

        let width = self.config.pool_width.min(targets.len());
        let targets = Arc::new(targets.to_vec());
        let cursor = Arc::new(AtomicUsize::new(0));
        let cancel = Arc::new(AtomicBool::new(false));

        // Records stream out of the workers as they are produced, so an
        // outcome that already hit the order log is never lost when its
        // worker is later aborted.
        let (record_tx, mut record_rx) = mpsc::unbounded_channel();

        debug!(width, targets = targets.len(), "Starting monitoring pool");

        let mut handles = Vec::with_capacity(width);
        for worker_id in 0..width {
            handles.push(tokio::spawn(worker(
                worker_id,
                Arc::clone(&targets),
                Arc::clone(&cursor),
                Arc::clone(&cancel),
                Arc::clone(account),
                Arc::clone(session),
                Arc::clone(adapter),
                Arc::clone(sink),
                record_tx.clone(),
            )));
        }
        drop(record_tx);

        let abort_handles: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();
        let mut joined = futures::future::join_all(handles);

        let grace = Duration::from_secs(self.config.grace_period_secs);
        let kill = Duration::from_secs(self.config.kill_timeout_secs);

        // Workers normally drain the cursor and the join resolves. When a
        // worker flags a session-level fault, siblings get the grace period
        // to wind down, then the remaining tasks are aborted outright.
        let joined_results = tokio::select! {
            results = &mut joined => results,
            _ = cancelled_then_grace(Arc::clone(&cancel), grace) => {
                warn!("Grace period expired after cancellation, aborting workers");
                for handle in &abort_handles {
                    handle.abort();
                }
                match tokio::time::timeout(kill, joined).await {
                    Ok(results) => results,
                    Err(_) => {
                        error!("Workers did not stop within the kill window");
                        Vec::new()
                    }
                }
            }
        };

        for joined in joined_results {
            if let Err(e) = joined {
                if !e.is_cancelled() {
                    error!("Monitoring worker panicked: {}", e);
                }
            }
        }

        record_rx.close();
        let mut records = Vec::new();
        while let Ok(record) = record_rx.try_recv() {
            records.push(record);
        }
        records
    }
}

/// Resolves once the cancel flag is raised and the grace period has passed.
/// Pends forever while the pool is healthy.
async fn cancelled_then_grace(cancel: Arc<AtomicBool>, grace: Duration) {
    while !cancel.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    tokio::time::sleep(grace).await;
}

#[allow(clippy::too_many_arguments)]
async fn worker(
    worker_id: usize,
    targets: Arc<Vec<ProductTarget>>,
    cursor: Arc<AtomicUsize>,
    cancel: Arc<AtomicBool>,
    account: Arc<Account>,
    session: Arc<Session>,
    adapter: Arc<dyn SiteAdapter>,
    sink: Arc<OutcomeSink>,
    records: mpsc::UnboundedSender<OrderRecord>,
) {
    loop {
        if cancel.load(Ordering::SeqCst) {
            debug!(worker_id, "Worker stopping on cancellation");
            break;
        }

        let index = cursor.fetch_add(1, Ordering::SeqCst);
        if index >= targets.len() {
            break;
        }
        let target = &targets[index];

        match process_target(&account, target, &session, &adapter, &sink, &cancel).await {
            Ok(Some(record)) => {
                let _ = records.send(record);
            }
            Ok(None) => {}
            Err(e) => {
                // One target's failure never cancels its siblings.
                warn!(worker_id, url = %target.url, "Target processing failed: {}", e);
                let snapshot =
                    ProductSnapshot::new(&target.url, &target.product_id, "", false);
                let record = OrderRecord::new(&account.email, snapshot, OutcomeStatus::Failed);
                if let Err(log_err) = sink.record(&record) {
                    error!(worker_id, "Failed to record target failure: {}", log_err);
                }
                let _ = records.send(record);
            }
        }
    }
}

/// Runs one target on its own fresh page. The page is closed on every exit
/// path; a failure to even open one means the shared session is gone, which
/// raises the pool-wide cancel flag.
async fn process_target(
    account: &Arc<Account>,
    target: &ProductTarget,
    session: &Arc<Session>,
    adapter: &Arc<dyn SiteAdapter>,
    sink: &Arc<OutcomeSink>,
    cancel: &Arc<AtomicBool>,
) -> Result<Option<OrderRecord>> {
    let page = match session.open_page() {
        Ok(page) => page,
        Err(e) => {
            cancel.store(true, Ordering::SeqCst);
            return Err(e);
        }
    };

    let outcome = check_and_buy(&page, account, target, adapter, sink).await;
    page.close();
    outcome
}

async fn check_and_buy(
    page: &crate::session::Page,
    account: &Arc<Account>,
    target: &ProductTarget,
    adapter: &Arc<dyn SiteAdapter>,
    sink: &Arc<OutcomeSink>,
) -> Result<Option<OrderRecord>> {
    let snapshot = match adapter.check_product(page, target).await? {
        Some(snapshot) => snapshot,
        None => {
            debug!(url = %target.url, "No usable product information");
            return Ok(None);
        }
    };

    if !snapshot.available {
        debug!(url = %target.url, "Product not available");
        return Ok(None);
    }
    info!(url = %target.url, name = %snapshot.name, "Product available");

    if !adapter.add_to_cart(page).await? {
        let record = OrderRecord::new(&account.email, snapshot, OutcomeStatus::Skipped);
        persist(sink, &record);
        return Ok(Some(record));
    }

    let status = match adapter.checkout_mode() {
        // Per-item storefronts confirm the purchase right here, on the
        // worker's own page.
        CheckoutMode::PerItem => {
            if adapter
                .checkout(page, &account.card, &account.address)
                .await?
            {
                OutcomeStatus::Purchased
            } else {
                OutcomeStatus::Skipped
            }
        }
        // Cart-based storefronts confirm once after the pool completes;
        // the record is provisional until then.
        CheckoutMode::Batch => OutcomeStatus::Purchased,
    };

    let record = OrderRecord::new(&account.email, snapshot, status);
    persist(sink, &record);
    if record.status.is_purchased() {
        // Best effort; failures are logged inside the sink and never bubble.
        let _ = sink.notify(&record).await;
    }
    Ok(Some(record))
}

/// A failed log write is a sink fault, not a target fault: the outcome
/// already happened on the storefront, so the record is still returned and
/// the target is never re-reported as Failed.
fn persist(sink: &Arc<OutcomeSink>, record: &OrderRecord) {
    if let Err(e) = sink.record(record) {
        error!(product = %record.product.name, "Failed to persist order record: {}", e);
    }
}
