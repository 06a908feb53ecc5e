//! `categories` command

use clap::Args;
use serde::Serialize;
use std::io::Write;
use tracing::info;

use super::{required_id, CatalogStack, CliError};
use crate::cancel::{cancel_after, CancellationToken};
use crate::catalog::CatalogApi;
use crate::config::Config;
use crate::server::handlers::{flatten_categories, FlatCategory};

/// Arguments for the `categories` command
#[derive(Args, Debug, Clone, Default)]
pub struct CategoriesArgs {
    /// Store identifier (overrides upstream.store_id)
    #[arg(long)]
    pub store_id: Option<i64>,

    /// Include root-level entries that have no children
    #[arg(long, default_value_t = false)]
    pub all: bool,
}

#[derive(Serialize)]
struct CategoriesOutput<'a> {
    store_id: i64,
    count: usize,
    categories: &'a [FlatCategory],
}

impl CategoriesArgs {
    /// Print the flattened category tree to stdout.
    pub async fn execute(&self, config: &Config, cancel: CancellationToken) -> Result<(), CliError> {
        let store_id = required_id(self.store_id, config.upstream.store_id, "store_id")?;
        let stack = CatalogStack::from_config(config, 1)?;

        let deadline = cancel.child_token();
        cancel_after(&deadline, config.cli_deadline());
        let _guard = deadline.clone().drop_guard();

        let tree = stack.client.list_categories(store_id, &deadline).await?;
        let categories = flatten_categories(&tree, !self.all);
        info!(store_id, count = categories.len(), "Categories fetched");

        let json = serde_json::to_string_pretty(&CategoriesOutput {
            store_id,
            count: categories.len(),
            categories: &categories,
        })?;
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{json}")?;
        Ok(())
    }
}
