//! CLI error types and conversions

use crate::catalog::CatalogError;
use crate::config::ConfigError;
use crate::metrics::MetricsError;
use crate::output::OutputError;
use crate::proxy::ProxyError;
use crate::scan::ScanError;
use crate::transport::TransportError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration could not be loaded
    #[error("config error: {0}")]
    ConfigError(#[from] ConfigError),

    /// Proxy settings are invalid
    #[error("proxy error: {0}")]
    ProxyError(#[from] ProxyError),

    /// Transport could not be built
    #[error("transport error: {0}")]
    TransportError(#[from] TransportError),

    /// Upstream call failed
    #[error("catalog error: {0}")]
    CatalogError(#[from] CatalogError),

    /// Result could not be written
    #[error("output error: {0}")]
    OutputError(#[from] OutputError),

    /// Store scan rejected its input
    #[error("scan error: {0}")]
    ScanError(#[from] ScanError),

    /// Metrics exporter could not start
    #[error("metrics error: {0}")]
    MetricsError(#[from] MetricsError),

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// I/O error (server bind, stdout)
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
