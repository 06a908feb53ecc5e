//! `serve` command

use clap::Args;

use super::{CatalogStack, CliError};
use crate::config::Config;
use crate::server::{self, AppState, SERVER_CONCURRENCY};

/// Arguments for the `serve` command
#[derive(Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// Bind host (overrides server.host)
    #[arg(long)]
    pub host: Option<String>,

    /// Bind port (overrides server.port)
    #[arg(long)]
    pub port: Option<u16>,
}

impl ServeArgs {
    /// Run the HTTP API until the process is stopped.
    pub async fn execute(&self, config: &Config) -> Result<(), CliError> {
        let host = match self.host.as_deref().map(str::trim) {
            Some(host) if !host.is_empty() => host.to_string(),
            _ => config.server.host.clone(),
        };
        let port = match self.port {
            Some(port) if port > 0 => port,
            _ => config.server.port,
        };

        let stack = CatalogStack::from_config(config, SERVER_CONCURRENCY)?;
        let state = AppState {
            api: stack.client,
            products: stack.products,
            default_store_id: config.upstream.store_id,
            timeout: config.http_timeout(),
        };

        server::run(&host, port, state).await?;
        Ok(())
    }
}
