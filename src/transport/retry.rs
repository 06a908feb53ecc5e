//! Retry decorator with exponential backoff and jitter
//!
//! Retries on:
//! - network errors (timeout, connection refused, send failure)
//! - 5xx server errors
//! - 429 rate limit errors (honouring `Retry-After`, capped at 60s)
//!
//! Does not retry on:
//! - cancellation
//! - other statuses, which are returned to the caller untouched

use async_trait::async_trait;
use rand::Rng;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Request, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{Transport, TransportError, TransportResult, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY};
use crate::cancel::{self, sleep_or_cancel, CancellationToken};
use crate::metrics;

/// Upper bound for a server-supplied `Retry-After`.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// How much of a discarded response body is drained before it is dropped.
const DRAIN_LIMIT: usize = 32 * 1024;

/// Retry budget and backoff shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts = `max_retries + 1`
    pub max_retries: u32,
    /// Delay before the first retry, doubled per attempt
    pub base_delay: Duration,
    /// Cap on the un-jittered delay
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Build a policy; zero delays fall back to the defaults.
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay: if base_delay.is_zero() { DEFAULT_BASE_DELAY } else { base_delay },
            max_delay: if max_delay.is_zero() { DEFAULT_MAX_DELAY } else { max_delay },
        }
    }

    /// Un-jittered delay after attempt `attempt` (0-indexed):
    /// `min(base * 2^attempt, max_delay)`.
    pub fn capped_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Delay after attempt `attempt` with an explicit jitter factor.
    pub fn delay_with_jitter(&self, attempt: u32, jitter: f64) -> Duration {
        self.capped_delay(attempt).mul_f64(jitter)
    }

    /// Delay after attempt `attempt` with jitter drawn from `[0.5, 1.5)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let jitter = rand::thread_rng().gen_range(0.5..1.5);
        self.delay_with_jitter(attempt, jitter)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY)
    }
}

/// 429 and every 5xx are retryable.
pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Parse `Retry-After` as whole seconds, capped at [`MAX_RETRY_AFTER`].
///
/// Missing, non-numeric (including HTTP-date) and non-positive values yield
/// `None`.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?;
    let seconds: i64 = raw.trim().parse().ok()?;
    if seconds <= 0 {
        return None;
    }
    Some(Duration::from_secs(seconds as u64).min(MAX_RETRY_AFTER))
}

async fn drain(mut response: Response) {
    let mut read = 0usize;
    while read < DRAIN_LIMIT {
        match response.chunk().await {
            Ok(Some(chunk)) => read += chunk.len(),
            _ => break,
        }
    }
}

/// Retry decorator around any [`Transport`]
pub struct RetryTransport {
    inner: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl RetryTransport {
    /// Wrap `inner` with `policy`.
    pub fn new(inner: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Configured retry budget
    pub fn max_retries(&self) -> u32 {
        self.policy.max_retries
    }

    /// Configured policy
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl Transport for RetryTransport {
    async fn execute(&self, request: Request, cancel: &CancellationToken) -> TransportResult<Response> {
        let max_retries = self.policy.max_retries;
        let max_attempts = max_retries + 1;
        let url = request.url().to_string();

        let mut original = Some(request);
        let mut last_error: Option<TransportError> = None;
        let mut attempt = 0u32;

        while attempt <= max_retries {
            cancel::check(cancel)?;

            // A fresh copy per attempt. Streaming bodies cannot be cloned: the
            // first attempt consumes the original, later attempts are fatal.
            let current = match original.as_ref().and_then(Request::try_clone) {
                Some(cloned) => cloned,
                None => match original.take() {
                    Some(req) if attempt == 0 => req,
                    _ => return Err(TransportError::BodyNotReplayable),
                },
            };

            match self.inner.execute(current, cancel).await {
                Ok(response) => {
                    let status = response.status();
                    if !is_retryable_status(status) {
                        if attempt > 0 {
                            debug!(attempt = attempt + 1, %url, "Request succeeded after retry");
                        }
                        return Ok(response);
                    }

                    let retry_after = parse_retry_after(response.headers());
                    drain(response).await;

                    warn!(
                        attempt = attempt + 1,
                        max_attempts,
                        status = status.as_u16(),
                        %url,
                        "Retryable status"
                    );
                    last_error = Some(TransportError::RetryableStatus(status));

                    if status == StatusCode::TOO_MANY_REQUESTS && attempt < max_retries {
                        if let Some(delay) = retry_after {
                            debug!(delay_ms = delay.as_millis() as u64, "Honouring Retry-After");
                            metrics::record_retry_backoff(delay, attempt + 1);
                            sleep_or_cancel(delay, cancel).await?;
                            attempt += 1;
                            continue;
                        }
                    }
                }
                Err(err) if err.is_cancelled() || !err.is_retryable() => return Err(err),
                Err(err) => {
                    warn!(
                        attempt = attempt + 1,
                        max_attempts,
                        error = %err,
                        %url,
                        "Retryable error"
                    );
                    last_error = Some(err);
                }
            }

            if attempt == max_retries {
                break;
            }

            let delay = self.policy.backoff(attempt);
            debug!(delay_ms = delay.as_millis() as u64, "Retrying after backoff");
            metrics::record_retry_backoff(delay, attempt + 1);
            sleep_or_cancel(delay, cancel).await?;
            attempt += 1;
        }

        Err(TransportError::RetriesExhausted {
            attempts: max_attempts,
            last: Box::new(last_error.unwrap_or_else(|| {
                TransportError::Config("retry loop ended without an attempt".to_string())
            })),
        })
    }
}
