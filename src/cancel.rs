//! Cooperative cancellation shared across async tasks.
//!
//! A [`CancellationToken`] is scoped to one logical operation (a category
//! fetch, a store scan, one API request). Every suspension point in the
//! request pipeline races against it: admission into the concurrency gate,
//! retry backoff sleeps and proxy rotation lookups. Network calls that were
//! already dispatched are left to finish or hit their own timeout.

use std::future::Future;
use std::time::Duration;

pub use tokio_util::sync::{CancellationToken, DropGuard};

/// Error returned when an operation observes cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// `Err(Cancelled)` once the token has fired.
pub fn check(cancel: &CancellationToken) -> Result<(), Cancelled> {
    if cancel.is_cancelled() {
        Err(Cancelled)
    } else {
        Ok(())
    }
}

/// Drive `fut` to completion unless the token fires first.
pub async fn until_cancelled<F>(cancel: &CancellationToken, fut: F) -> Result<F::Output, Cancelled>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Cancelled),
        out = fut => Ok(out),
    }
}

/// Cancel `token` once `deadline` elapses. The timer task exits early if the
/// token fires first.
pub fn cancel_after(token: &CancellationToken, deadline: Duration) {
    let token = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(deadline) => token.cancel(),
            _ = token.cancelled() => {}
        }
    });
}

/// Sleep for `duration`, waking early with `Err(Cancelled)` if the token fires.
pub async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> Result<(), Cancelled> {
    if duration.is_zero() {
        return check(cancel);
    }
    until_cancelled(cancel, tokio::time::sleep(duration)).await
}
