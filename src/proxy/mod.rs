//! Outbound proxy selection
//!
//! Two strategies sit behind [`ProxyProvider`]:
//!
//! - [`list::ListProvider`]: static list, atomic round-robin
//! - [`rotation::RotationProvider`]: address fetched from a rotation URL and
//!   cached for a TTL
//!
//! [`ProxyRouter`] adapts a provider into a per-request decision and applies
//! the fail-open / fail-closed policy.

use reqwest::Url;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;

pub mod list;
pub mod rotation;

pub use list::ListProvider;
pub use rotation::RotationProvider;

/// Default cache lifetime for a rotated proxy.
pub const DEFAULT_ROTATION_TTL: Duration = Duration::from_secs(10);

/// Proxy selection errors
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// The static list had no usable entries
    #[error("proxy list is empty")]
    EmptyList,

    /// Rotation mode without a URL
    #[error("proxy.mode=rotation but rotation_url is empty")]
    MissingRotationUrl,

    /// Unrecognised mode string
    #[error("unknown proxy.mode={0:?} (expected disabled|list|rotation)")]
    UnknownMode(String),

    /// Provider returned nothing usable
    #[error("empty proxy address")]
    Empty,

    /// Address could not be parsed as a URL
    #[error("invalid proxy address {address:?}: {reason}")]
    InvalidAddress {
        /// Address after scheme defaulting
        address: String,
        /// Parser message
        reason: String,
    },

    /// Rotation endpoint failed
    #[error("rotation fetch failed: {0}")]
    Rotation(String),

    /// Rotation endpoint answered with a non-2xx status
    #[error("rotation_url status={status} body={body}")]
    RotationStatus {
        /// HTTP status
        status: u16,
        /// Trimmed response body
        body: String,
    },

    /// Cancellation fired while selecting
    #[error("proxy selection cancelled")]
    Cancelled,
}

/// Proxy mode as written in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyMode {
    /// No proxy; requests go direct
    Disabled,
    /// Static round-robin list
    List,
    /// Rotation endpoint
    Rotation,
}

impl ProxyMode {
    /// Parse a mode string. Blank means disabled.
    pub fn parse(raw: &str) -> Result<Self, ProxyError> {
        match raw.trim().to_lowercase().as_str() {
            "" | "disabled" => Ok(ProxyMode::Disabled),
            "list" => Ok(ProxyMode::List),
            "rotation" => Ok(ProxyMode::Rotation),
            other => Err(ProxyError::UnknownMode(other.to_string())),
        }
    }
}

impl fmt::Display for ProxyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyMode::Disabled => write!(f, "disabled"),
            ProxyMode::List => write!(f, "list"),
            ProxyMode::Rotation => write!(f, "rotation"),
        }
    }
}

/// Proxy section of the configuration
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProxySettings {
    /// disabled | list | rotation
    pub mode: String,
    /// Addresses for list mode
    pub list: Vec<String>,
    /// Endpoint for rotation mode
    pub rotation_url: String,
    /// Cache lifetime for rotation mode
    pub rotation_ttl_seconds: u64,
    /// Send directly instead of failing when no proxy can be selected
    pub fail_open: bool,
}

impl ProxySettings {
    /// True when nothing proxy-related was configured.
    pub fn is_empty(&self) -> bool {
        self.mode.trim().is_empty() && self.list.is_empty() && self.rotation_url.trim().is_empty()
    }
}

/// The two proxy strategies
pub enum ProxyProvider {
    /// Static round-robin list
    List(ListProvider),
    /// Fetched and cached address
    Rotation(RotationProvider),
}

impl ProxyProvider {
    /// Next proxy address, as supplied by the strategy.
    pub async fn next(&self, cancel: &CancellationToken) -> Result<String, ProxyError> {
        match self {
            ProxyProvider::List(p) => p.next(cancel),
            ProxyProvider::Rotation(p) => p.next(cancel).await,
        }
    }

    /// Strategy name for logs and metrics
    pub fn mode(&self) -> ProxyMode {
        match self {
            ProxyProvider::List(_) => ProxyMode::List,
            ProxyProvider::Rotation(_) => ProxyMode::Rotation,
        }
    }
}

/// Turn a raw address into a proxy URL, assuming `http://` when no scheme
/// is given.
pub fn parse_proxy_address(raw: &str) -> Result<Url, ProxyError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ProxyError::Empty);
    }
    let address = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };
    Url::parse(&address).map_err(|e| ProxyError::InvalidAddress {
        address,
        reason: e.to_string(),
    })
}

/// Per-request proxy decision with a fail-open / fail-closed policy
#[derive(Clone)]
pub struct ProxyRouter {
    provider: Arc<ProxyProvider>,
    fail_open: bool,
}

impl ProxyRouter {
    /// Wrap a provider.
    pub fn new(provider: ProxyProvider, fail_open: bool) -> Self {
        Self {
            provider: Arc::new(provider),
            fail_open,
        }
    }

    /// Build a router from configuration. `Ok(None)` when proxying is
    /// disabled.
    pub fn from_settings(settings: &ProxySettings) -> Result<Option<Self>, ProxyError> {
        let mode = ProxyMode::parse(&settings.mode)?;
        let provider = match mode {
            ProxyMode::Disabled => return Ok(None),
            ProxyMode::List => {
                let provider = ListProvider::new(&settings.list)?;
                info!(
                    mode = %mode,
                    count = provider.len(),
                    fail_open = settings.fail_open,
                    "Proxy enabled"
                );
                ProxyProvider::List(provider)
            }
            ProxyMode::Rotation => {
                if settings.rotation_url.trim().is_empty() {
                    return Err(ProxyError::MissingRotationUrl);
                }
                let ttl = match settings.rotation_ttl_seconds {
                    0 => DEFAULT_ROTATION_TTL,
                    secs => Duration::from_secs(secs),
                };
                let provider = RotationProvider::new(settings.rotation_url.trim(), ttl)?;
                info!(
                    mode = %mode,
                    rotation_url = %settings.rotation_url,
                    ttl_secs = ttl.as_secs(),
                    fail_open = settings.fail_open,
                    "Proxy enabled"
                );
                ProxyProvider::Rotation(provider)
            }
        };
        Ok(Some(Self::new(provider, settings.fail_open)))
    }

    /// Whether selection failures are downgraded to direct requests.
    pub fn fail_open(&self) -> bool {
        self.fail_open
    }

    /// Select the proxy for one request.
    ///
    /// `Ok(Some(url))` routes through the proxy, `Ok(None)` sends directly
    /// (fail-open after a failure). Cancellation is always propagated.
    pub async fn resolve(&self, cancel: &CancellationToken) -> Result<Option<Url>, ProxyError> {
        let selected = self
            .provider
            .next(cancel)
            .await
            .and_then(|raw| parse_proxy_address(&raw));

        match selected {
            Ok(url) => {
                debug!(host = url.host_str().unwrap_or(""), "Proxy selected");
                Ok(Some(url))
            }
            Err(ProxyError::Cancelled) => Err(ProxyError::Cancelled),
            Err(e) => {
                warn!(error = %e, mode = %self.provider.mode(), fail_open = self.fail_open, "Proxy provider error");
                crate::metrics::record_proxy_failure(self.provider.mode());
                if self.fail_open {
                    Ok(None)
                } else {
                    Err(e)
                }
            }
        }
    }
}
