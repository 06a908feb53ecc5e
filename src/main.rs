//! Main entry point for the catalog-scraper CLI

use clap::Parser;
use catalog_scraper::cancel::CancellationToken;
use catalog_scraper::cli::{Cli, Commands};
use catalog_scraper::config::{Config, LogConfig};
use catalog_scraper::metrics::init_metrics;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Initialize tracing from the log section; `RUST_LOG` and
/// `LOG_FORMAT=json` take precedence over the file.
fn init_tracing(log: &LogConfig) {
    let json_format = log.is_json()
        || std::env::var("LOG_FORMAT")
            .map(|v| v.to_lowercase() == "json")
            .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("catalog_scraper={0},actix_web={0}", log.filter_directive())));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(log.add_source)
        .with_line_number(log.add_source);

    if json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: &Cli, config: &Config, cancel: CancellationToken) -> anyhow::Result<()> {
    if let Some(addr) = cli.metrics_addr {
        init_metrics(addr)?;
    }

    match &cli.command {
        Commands::Category(args) => args.execute(config, cancel).await?,
        Commands::Categories(args) => args.execute(config, cancel).await?,
        Commands::ScanStores(args) => args.execute(config, cancel).await?,
        Commands::Serve(args) => args.execute(config).await?,
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            init_tracing(&LogConfig::default());
            error!(path = %cli.config.display(), "Load config failed: {}", e);
            std::process::exit(1);
        }
    };
    init_tracing(&config.log);

    // Ctrl+C cancels whatever the command is doing; `serve` is stopped by
    // actix-web's own signal handling.
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Ctrl+C received, cancelling");
                cancel.cancel();
            }
        }
    });

    if let Err(e) = run(&cli, &config, cancel).await {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }
}
