//! CLI command implementations

pub mod categories;
pub mod category;
pub mod error;
pub mod scan;
pub mod serve;

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use crate::catalog::{CatalogClient, CategoryProductsService};
use crate::config::{Config, DEFAULT_CONFIG_PATH};
use crate::proxy::ProxyRouter;
use crate::transport;

pub use categories::CategoriesArgs;
pub use category::CategoryArgs;
pub use error::CliError;
pub use scan::ScanStoresArgs;
pub use serve::ServeArgs;

/// Catalog scraper CLI
#[derive(Parser, Debug)]
#[command(name = "catalog-scraper")]
#[command(about = "Fetch stores, categories and products from the catalog API", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the YAML configuration
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Expose Prometheus metrics on this address (e.g. 127.0.0.1:9000)
    #[arg(long, global = true)]
    pub metrics_addr: Option<SocketAddr>,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Collect the products of one category into a JSON file
    Category(CategoryArgs),

    /// Print the category tree of a store as JSON
    Categories(CategoriesArgs),

    /// Look up every store identifier in a range
    ScanStores(ScanStoresArgs),

    /// Run the HTTP API
    Serve(ServeArgs),
}

/// Client and use case wired from configuration
pub struct CatalogStack {
    /// Typed upstream client
    pub client: Arc<CatalogClient>,
    /// Category products use case over `client`
    pub products: Arc<CategoryProductsService>,
}

impl CatalogStack {
    /// Build the transport chain (proxy, retries, `concurrency` in-flight
    /// requests) and the client on top of it.
    pub fn from_config(config: &Config, concurrency: usize) -> Result<Self, CliError> {
        let mut options = config.transport_options(concurrency);
        options.proxy = ProxyRouter::from_settings(&config.proxy)?;

        let transport = transport::build(options)?;
        let client = Arc::new(CatalogClient::new(transport, &config.upstream.base_url)?);
        let products = Arc::new(CategoryProductsService::new(
            client.clone(),
            client.base_url(),
            config.pagination_settings(),
        ));

        Ok(Self { client, products })
    }
}

/// Resolve a positive identifier from a flag or its configured default.
pub(crate) fn required_id(flag: Option<i64>, configured: i64, what: &str) -> Result<i64, CliError> {
    let id = match flag {
        Some(id) if id > 0 => id,
        _ => configured,
    };
    if id <= 0 {
        return Err(CliError::InvalidArgument(format!(
            "{what} must be > 0 (set it in the config or pass --{})",
            what.replace('_', "-")
        )));
    }
    Ok(id)
}
