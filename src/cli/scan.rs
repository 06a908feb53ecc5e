//! `scan-stores` command

use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use super::{CatalogStack, CliError};
use crate::cancel::CancellationToken;
use crate::catalog::CatalogApi;
use crate::config::Config;
use crate::output::{JsonRepository, StoresResult};
use crate::scan::{StoreScanner, DEFAULT_WORKERS};

/// Transport concurrency for store scans
pub const SCAN_CONCURRENCY: usize = 50;

/// Arguments for the `scan-stores` command
#[derive(Args, Debug, Clone)]
pub struct ScanStoresArgs {
    /// First store identifier (inclusive)
    #[arg(long, default_value_t = 1)]
    pub from: i64,

    /// Last store identifier (inclusive)
    #[arg(long, default_value_t = 20000)]
    pub to: i64,

    /// Concurrent workers
    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Output file
    #[arg(long, default_value = "./output/stores.json")]
    pub out: PathBuf,
}

impl ScanStoresArgs {
    /// Scan the range and save every store found. Ctrl+C stops the scan
    /// and saves what was found so far.
    pub async fn execute(&self, config: &Config, cancel: CancellationToken) -> Result<(), CliError> {
        if self.from <= 0 || self.to <= 0 || self.to < self.from {
            return Err(CliError::InvalidArgument(format!(
                "bad range: from={} to={}",
                self.from, self.to
            )));
        }

        let stack = CatalogStack::from_config(config, SCAN_CONCURRENCY)?;
        let api: Arc<dyn CatalogApi> = stack.client;
        let repository = JsonRepository::new(&self.out);

        info!(from = self.from, to = self.to, workers = self.workers, "Scan started");
        let report = StoreScanner::new(api, self.workers)
            .scan(self.from, self.to, &cancel)
            .await?;
        if report.cancelled {
            warn!(scanned = report.scanned, found = report.found, "Scan interrupted, saving partial result");
        }

        let result = StoresResult::new(report.stores);
        repository.save_stores(&result)?;

        info!(
            env = %config.env,
            from = self.from,
            to = self.to,
            scanned = report.scanned,
            found = result.count,
            output = %self.out.display(),
            "Done"
        );
        Ok(())
    }
}
