//! Layered HTTP request pipeline
//!
//! Every outbound call goes through a [`Transport`]. The chain is assembled
//! by explicit wrapping:
//!
//! ```text
//! ConcurrencyLimit -> RetryTransport -> HttpTransport -> upstream
//! ```
//!
//! - [`http::HttpTransport`] executes exactly one request (optionally through
//!   a proxy chosen per request).
//! - [`retry::RetryTransport`] re-issues requests on 429/5xx and network
//!   failures with jittered exponential backoff.
//! - [`concurrency::ConcurrencyLimit`] bounds the number of in-flight calls.
//!
//! Use [`build`] to assemble the chain from [`TransportOptions`].

use async_trait::async_trait;
use reqwest::{Request, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::cancel::{CancellationToken, Cancelled};
use crate::proxy::{ProxyError, ProxyRouter};

pub mod concurrency;
pub mod http;
pub mod retry;

pub use concurrency::ConcurrencyLimit;
pub use http::{ClientSettings, HttpTransport};
pub use retry::{RetryPolicy, RetryTransport};

/// Default base delay for retry backoff.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(300);

/// Default cap for a single retry backoff.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(8);

/// Transport-level failures
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The caller's cancellation signal fired
    #[error("request cancelled")]
    Cancelled,

    /// Network or protocol failure reported by the HTTP client
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Upstream answered with 429 or 5xx
    #[error("retryable status={0}")]
    RetryableStatus(StatusCode),

    /// A retry was needed but the request body cannot be replayed
    #[error("cannot retry request with body: body is not replayable")]
    BodyNotReplayable,

    /// Proxy selection failed and the router is fail-closed
    #[error("proxy error: {0}")]
    Proxy(#[from] ProxyError),

    /// Every allowed attempt failed
    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Number of network attempts made
        attempts: u32,
        /// The error recorded on the final attempt
        #[source]
        last: Box<TransportError>,
    },

    /// The transport could not be constructed
    #[error("transport configuration error: {0}")]
    Config(String),
}

impl From<Cancelled> for TransportError {
    fn from(_: Cancelled) -> Self {
        TransportError::Cancelled
    }
}

impl TransportError {
    /// Whether the retry layer should re-issue the request.
    ///
    /// Timeouts, connection failures and send failures are retryable,
    /// as are 429/5xx statuses. Cancellation, builder, redirect and decode
    /// errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Cancelled => false,
            TransportError::Network(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            TransportError::RetryableStatus(_) => true,
            TransportError::Proxy(e) => !matches!(e, ProxyError::Cancelled),
            TransportError::BodyNotReplayable
            | TransportError::RetriesExhausted { .. }
            | TransportError::Config(_) => false,
        }
    }

    /// Whether this error (or the last error of an exhausted retry) was caused
    /// by cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            TransportError::Cancelled => true,
            TransportError::Proxy(ProxyError::Cancelled) => true,
            TransportError::RetriesExhausted { last, .. } => last.is_cancelled(),
            _ => false,
        }
    }

    /// HTTP status behind a retryable-status failure, looking through
    /// exhausted retries.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            TransportError::RetryableStatus(status) => Some(*status),
            TransportError::RetriesExhausted { last, .. } => last.status(),
            _ => None,
        }
    }
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// A request executor. Implementations either perform the call or wrap
/// another transport and add behaviour around it.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute `request`, observing `cancel` at every wait point.
    async fn execute(&self, request: Request, cancel: &CancellationToken) -> TransportResult<Response>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn execute(&self, request: Request, cancel: &CancellationToken) -> TransportResult<Response> {
        (**self).execute(request, cancel).await
    }
}

/// Options for [`build`]
#[derive(Clone)]
pub struct TransportOptions {
    /// Settings for the underlying reqwest clients
    pub client: ClientSettings,
    /// Optional per-request proxy selection
    pub proxy: Option<ProxyRouter>,
    /// Retries after the first attempt (0 disables the retry layer)
    pub retries: u32,
    /// Maximum in-flight requests (0 disables the concurrency layer)
    pub concurrency: usize,
    /// Backoff base delay
    pub base_delay: Duration,
    /// Backoff cap
    pub max_delay: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            client: ClientSettings::default(),
            proxy: None,
            retries: 3,
            concurrency: 0,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

/// Assemble the transport chain.
///
/// The retry layer is added only when `retries > 0` and the concurrency
/// layer only when `concurrency > 0`. Zero or negative delays fall back to
/// [`DEFAULT_BASE_DELAY`] / [`DEFAULT_MAX_DELAY`].
pub fn build(options: TransportOptions) -> TransportResult<Arc<dyn Transport>> {
    let base = HttpTransport::new(options.client, options.proxy)?;
    Ok(wrap(Arc::new(base), options.retries, options.concurrency, options.base_delay, options.max_delay))
}

/// Wrap an existing transport with the retry and concurrency layers.
pub fn wrap(
    base: Arc<dyn Transport>,
    retries: u32,
    concurrency: usize,
    base_delay: Duration,
    max_delay: Duration,
) -> Arc<dyn Transport> {
    let mut transport = base;

    if retries > 0 {
        let policy = RetryPolicy::new(retries, base_delay, max_delay);
        debug!(
            max_retries = policy.max_retries,
            base_delay_ms = policy.base_delay.as_millis() as u64,
            max_delay_ms = policy.max_delay.as_millis() as u64,
            "Retry layer enabled"
        );
        transport = Arc::new(RetryTransport::new(transport, policy));
    }

    if concurrency > 0 {
        debug!(concurrency, "Concurrency layer enabled");
        transport = Arc::new(ConcurrencyLimit::new(transport, concurrency));
    }

    transport
}
