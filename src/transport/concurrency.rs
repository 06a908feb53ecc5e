//! Admission gate bounding in-flight requests
//!
//! Built on a tokio [`Semaphore`]. The permit is an owned RAII guard, so the
//! slot is released exactly once on every return path of the inner call:
//! success, error, or the future being dropped.

use async_trait::async_trait;
use reqwest::{Request, Response};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::trace;

use super::{Transport, TransportError, TransportResult};
use crate::cancel::{self, CancellationToken};

/// Concurrency decorator around any [`Transport`]
pub struct ConcurrencyLimit {
    inner: Arc<dyn Transport>,
    semaphore: Arc<Semaphore>,
    limit: usize,
}

impl ConcurrencyLimit {
    /// Allow at most `limit` concurrent calls into `inner`. A limit of zero
    /// is raised to one; use [`super::wrap`] to skip the layer entirely.
    pub fn new(inner: Arc<dyn Transport>, limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            inner,
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    /// Configured ceiling
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Slots currently free
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[async_trait]
impl Transport for ConcurrencyLimit {
    async fn execute(&self, request: Request, cancel: &CancellationToken) -> TransportResult<Response> {
        let permit = cancel::until_cancelled(cancel, self.semaphore.clone().acquire_owned())
            .await?
            .map_err(|e| TransportError::Config(format!("admission gate closed: {e}")))?;

        trace!(available = self.semaphore.available_permits(), "Admitted request");

        let result = self.inner.execute(request, cancel).await;
        drop(permit);
        result
    }
}
