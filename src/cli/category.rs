//! `category` command

use clap::Args;
use std::path::PathBuf;
use tracing::{info, warn};

use super::{required_id, CatalogStack, CliError};
use crate::cancel::{cancel_after, CancellationToken};
use crate::catalog::CatalogApi;
use crate::config::Config;
use crate::output::{CategoryMeta, CategoryResult, JsonRepository, StoreMeta};

/// Transport concurrency for a single category fetch
pub const CATEGORY_CONCURRENCY: usize = 5;

/// Arguments for the `category` command
#[derive(Args, Debug, Clone, Default)]
pub struct CategoryArgs {
    /// Store identifier (overrides upstream.store_id)
    #[arg(long)]
    pub store_id: Option<i64>,

    /// Category identifier (overrides cli.category_id)
    #[arg(long)]
    pub category_id: Option<i64>,

    /// Output file (overrides cli.output_file)
    #[arg(long)]
    pub out: Option<PathBuf>,
}

impl CategoryArgs {
    /// Output path from the flag or the configuration.
    pub fn output_path(&self, config: &Config) -> Result<PathBuf, CliError> {
        match &self.out {
            Some(path) if !path.as_os_str().is_empty() => Ok(path.clone()),
            _ if !config.cli.output_file.trim().is_empty() => Ok(PathBuf::from(config.cli.output_file.trim())),
            _ => Err(CliError::InvalidArgument(
                "output file must not be empty (set cli.output_file or pass --out)".to_string(),
            )),
        }
    }

    /// Fetch store info (best effort), collect the category and save the
    /// result. The whole run is bounded by `cli.deadline_seconds`.
    pub async fn execute(&self, config: &Config, cancel: CancellationToken) -> Result<(), CliError> {
        let store_id = required_id(self.store_id, config.upstream.store_id, "store_id")?;
        let category_id = required_id(self.category_id, config.cli.category_id, "category_id")?;
        let output = self.output_path(config)?;

        let stack = CatalogStack::from_config(config, CATEGORY_CONCURRENCY)?;
        let repository = JsonRepository::new(&output);

        let deadline = cancel.child_token();
        cancel_after(&deadline, config.cli_deadline());
        let _guard = deadline.clone().drop_guard();
        let cancel = &deadline;

        let store = match stack.client.get_store(store_id, cancel).await {
            Ok(info) => Some(StoreMeta::from(info)),
            Err(e) => {
                warn!(store_id, error = %e, "Store info unavailable, continuing");
                None
            }
        };

        let (products, slug) = stack
            .products
            .get_by_category_id(store_id, category_id, cancel)
            .await?;

        let result = CategoryResult::new(
            store,
            Some(CategoryMeta {
                id: category_id,
                slug: slug.clone(),
            }),
            products,
        );
        repository.save(&result)?;

        info!(
            env = %config.env,
            store_id,
            category_id,
            slug = %slug,
            count = result.count,
            output = %output.display(),
            "Done"
        );
        Ok(())
    }
}
