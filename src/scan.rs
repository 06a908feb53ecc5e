//! Fan-out scan over a range of store identifiers
//!
//! Worker tasks pull identifiers from a shared cursor and look each store
//! up. Found stores are sent to a single aggregator task, so appends are
//! serialized regardless of the number of workers.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::catalog::CatalogApi;
use crate::metrics::FetchMetrics;
use crate::output::StoreMeta;

/// Default number of workers
pub const DEFAULT_WORKERS: usize = 40;

/// Default progress log interval
pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(2);

const FOUND_CHANNEL_CAPACITY: usize = 1024;

/// Scan errors
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// Range bounds must be positive and ordered
    #[error("bad range: from={from} to={to}")]
    InvalidRange {
        /// First identifier
        from: i64,
        /// Last identifier (inclusive)
        to: i64,
    },
}

/// Outcome of a scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Stores found, sorted by id
    pub stores: Vec<StoreMeta>,
    /// Identifiers looked up
    pub scanned: u64,
    /// Stores found
    pub found: u64,
    /// Whether cancellation cut the scan short
    pub cancelled: bool,
}

#[derive(Default)]
struct Counters {
    scanned: AtomicU64,
    found: AtomicU64,
}

/// Store identifier scanner
pub struct StoreScanner {
    api: Arc<dyn CatalogApi>,
    workers: usize,
    progress_interval: Duration,
}

impl StoreScanner {
    /// Scanner with `workers` concurrent tasks (0 selects 10).
    pub fn new(api: Arc<dyn CatalogApi>, workers: usize) -> Self {
        Self {
            api,
            workers: if workers == 0 { 10 } else { workers },
            progress_interval: PROGRESS_INTERVAL,
        }
    }

    /// Override the progress log interval
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Look up every identifier in `from..=to`.
    ///
    /// 404 responses are skipped silently; other failures are logged and
    /// skipped. Cancellation stops the workers and returns what was found.
    pub async fn scan(&self, from: i64, to: i64, cancel: &CancellationToken) -> Result<ScanReport, ScanError> {
        if from <= 0 || to <= 0 || to < from {
            return Err(ScanError::InvalidRange { from, to });
        }

        let fetch_metrics = FetchMetrics::start("store_scan", format!("{from}..={to}"));
        let cursor = Arc::new(AtomicI64::new(from));
        let counters = Arc::new(Counters::default());
        let (found_tx, mut found_rx) = mpsc::channel::<StoreMeta>(FOUND_CHANNEL_CAPACITY);

        let aggregator = tokio::spawn(async move {
            let mut stores = Vec::with_capacity(4096);
            while let Some(store) = found_rx.recv().await {
                stores.push(store);
            }
            stores
        });

        let progress = tokio::spawn({
            let counters = counters.clone();
            let period = self.progress_interval;
            async move {
                let mut ticker = tokio::time::interval(period);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    info!(
                        scanned = counters.scanned.load(Ordering::Relaxed),
                        found = counters.found.load(Ordering::Relaxed),
                        from,
                        to,
                        "Scan progress"
                    );
                }
            }
        });

        let mut workers = JoinSet::new();
        for _ in 0..self.workers {
            let api = self.api.clone();
            let cursor = cursor.clone();
            let counters = counters.clone();
            let found_tx = found_tx.clone();
            let cancel = cancel.clone();

            workers.spawn(async move {
                loop {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let id = cursor.fetch_add(1, Ordering::Relaxed);
                    if id > to {
                        break;
                    }
                    counters.scanned.fetch_add(1, Ordering::Relaxed);

                    match api.get_store(id, &cancel).await {
                        Ok(info) => {
                            counters.found.fetch_add(1, Ordering::Relaxed);
                            if found_tx.send(info.into()).await.is_err() {
                                break;
                            }
                        }
                        Err(e) if e.upstream_status() == Some(404) => {
                            debug!(store_id = id, "Store not found");
                        }
                        Err(e) if e.is_cancelled() => break,
                        Err(e) => {
                            warn!(store_id = id, error = %e, "Store lookup failed");
                        }
                    }
                }
            });
        }
        drop(found_tx);

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Scan worker panicked");
            }
        }
        progress.abort();

        let mut stores = aggregator.await.unwrap_or_default();
        stores.sort_by_key(|s| s.id);

        let report = ScanReport {
            scanned: counters.scanned.load(Ordering::Relaxed),
            found: stores.len() as u64,
            stores,
            cancelled: cancel.is_cancelled(),
        };
        fetch_metrics.record_success(report.stores.len());
        info!(
            scanned = report.scanned,
            found = report.found,
            cancelled = report.cancelled,
            "Scan finished"
        );
        Ok(report)
    }
}
