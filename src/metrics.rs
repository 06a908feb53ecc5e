//! Request pipeline metrics
//!
//! Metrics are recorded through the `metrics` facade and are no-ops until
//! [`init_metrics`] installs the Prometheus exporter (the `--metrics-addr`
//! CLI flag). Recorded series:
//!
//! - `catalog_http_requests_total{endpoint,status}`
//! - `catalog_http_request_duration_seconds{endpoint}`
//! - `catalog_http_retries_total{attempt}` / `catalog_retry_backoff_seconds`
//! - `catalog_proxy_failures_total{mode}`
//! - `catalog_fetches_total{kind,outcome}`

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::proxy::ProxyMode;

static METRICS_INITIALIZED: OnceCell<SocketAddr> = OnceCell::new();

static CORRELATION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Metrics setup errors
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// The exporter could not be installed
    #[error("failed to install Prometheus exporter: {0}")]
    Install(String),
}

/// Install the Prometheus exporter on `addr`. Idempotent.
pub fn init_metrics(addr: SocketAddr) -> Result<(), MetricsError> {
    if let Some(existing) = METRICS_INITIALIZED.get() {
        debug!(%existing, "Metrics already initialized, skipping");
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| MetricsError::Install(e.to_string()))?;

    describe_counter!(
        "catalog_http_requests_total",
        Unit::Count,
        "HTTP requests sent upstream, by endpoint and status"
    );
    describe_histogram!(
        "catalog_http_request_duration_seconds",
        Unit::Seconds,
        "Duration of a single upstream HTTP attempt"
    );
    describe_counter!(
        "catalog_http_retries_total",
        Unit::Count,
        "Retries scheduled by the retry layer"
    );
    describe_histogram!(
        "catalog_retry_backoff_seconds",
        Unit::Seconds,
        "Backoff or Retry-After delay before a retry"
    );
    describe_counter!(
        "catalog_proxy_failures_total",
        Unit::Count,
        "Proxy selections that failed"
    );
    describe_counter!(
        "catalog_fetches_total",
        Unit::Count,
        "Completed catalog fetch operations by outcome"
    );

    let _ = METRICS_INITIALIZED.set(addr);
    info!(%addr, "Metrics exporter listening");
    Ok(())
}

/// New correlation id for request tracing
pub fn generate_correlation_id() -> String {
    let id = CORRELATION_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
    format!("req-{id:08x}")
}

/// Timing for one upstream attempt
pub struct HttpRequestMetrics {
    endpoint: String,
    start_time: Instant,
    correlation_id: String,
}

impl HttpRequestMetrics {
    /// Start timing an attempt against `path`. Numeric path segments are
    /// collapsed so store and category ids do not become label values.
    pub fn start(path: &str) -> Self {
        let endpoint = endpoint_label(path);
        let correlation_id = generate_correlation_id();
        debug!(correlation_id = %correlation_id, endpoint = %endpoint, "HTTP request started");
        Self {
            endpoint,
            start_time: Instant::now(),
            correlation_id,
        }
    }

    /// Record an attempt that produced a response.
    pub fn record_complete(&self, status_code: u16) {
        let duration = self.start_time.elapsed();
        counter!(
            "catalog_http_requests_total",
            "endpoint" => self.endpoint.clone(),
            "status" => status_code.to_string(),
        )
        .increment(1);
        histogram!(
            "catalog_http_request_duration_seconds",
            "endpoint" => self.endpoint.clone(),
        )
        .record(duration.as_secs_f64());

        debug!(
            correlation_id = %self.correlation_id,
            endpoint = %self.endpoint,
            status = status_code,
            duration_ms = duration.as_millis() as u64,
            "HTTP request completed"
        );
    }

    /// Record an attempt that failed before a response arrived.
    pub fn record_network_error(&self) {
        let duration = self.start_time.elapsed();
        counter!(
            "catalog_http_requests_total",
            "endpoint" => self.endpoint.clone(),
            "status" => "network_error",
        )
        .increment(1);
        histogram!(
            "catalog_http_request_duration_seconds",
            "endpoint" => self.endpoint.clone(),
        )
        .record(duration.as_secs_f64());

        debug!(
            correlation_id = %self.correlation_id,
            endpoint = %self.endpoint,
            duration_ms = duration.as_millis() as u64,
            "HTTP request failed without response"
        );
    }

    /// Correlation id of this attempt
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

/// `/api/v3/stores/86/categories` -> `/api/v3/stores/:id/categories`
pub fn endpoint_label(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
                ":id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Record a scheduled retry and its delay.
pub fn record_retry_backoff(delay: Duration, attempt: u32) {
    counter!("catalog_http_retries_total", "attempt" => attempt.to_string()).increment(1);
    histogram!("catalog_retry_backoff_seconds").record(delay.as_secs_f64());
}

/// Record a failed proxy selection.
pub fn record_proxy_failure(mode: ProxyMode) {
    counter!("catalog_proxy_failures_total", "mode" => mode.to_string()).increment(1);
}

/// Outcome tracking for one catalog fetch (category products, store scan)
pub struct FetchMetrics {
    kind: &'static str,
    target: String,
    start_time: Instant,
}

impl FetchMetrics {
    /// Start tracking a fetch of `kind` for `target`.
    pub fn start(kind: &'static str, target: impl Into<String>) -> Self {
        let target = target.into();
        info!(kind, target = %target, "Fetch started");
        Self {
            kind,
            target,
            start_time: Instant::now(),
        }
    }

    /// Record success with the number of items produced.
    pub fn record_success(&self, items: usize) {
        counter!("catalog_fetches_total", "kind" => self.kind, "outcome" => "success").increment(1);
        info!(
            kind = self.kind,
            target = %self.target,
            items,
            duration_ms = self.start_time.elapsed().as_millis() as u64,
            "Fetch completed"
        );
    }

    /// Record failure.
    pub fn record_failure(&self, error: &str) {
        counter!("catalog_fetches_total", "kind" => self.kind, "outcome" => "failure").increment(1);
        error!(
            kind = self.kind,
            target = %self.target,
            error,
            duration_ms = self.start_time.elapsed().as_millis() as u64,
            "Fetch failed"
        );
    }
}
