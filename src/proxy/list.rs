//! Static proxy list with atomic round-robin

use std::sync::atomic::{AtomicUsize, Ordering};

use super::ProxyError;
use crate::cancel::CancellationToken;

/// Round-robin over a fixed, non-empty list of addresses
#[derive(Debug)]
pub struct ListProvider {
    items: Vec<String>,
    next: AtomicUsize,
}

impl ListProvider {
    /// Build from raw entries; blank entries are dropped. Fails when nothing
    /// is left.
    pub fn new<S: AsRef<str>>(entries: &[S]) -> Result<Self, ProxyError> {
        let items: Vec<String> = entries
            .iter()
            .map(|s| s.as_ref().trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        if items.is_empty() {
            return Err(ProxyError::EmptyList);
        }

        Ok(Self {
            items,
            next: AtomicUsize::new(0),
        })
    }

    /// Next address in list order, wrapping around.
    pub fn next(&self, cancel: &CancellationToken) -> Result<String, ProxyError> {
        if cancel.is_cancelled() {
            return Err(ProxyError::Cancelled);
        }
        let index = self.next.fetch_add(1, Ordering::Relaxed);
        Ok(self.items[index % self.items.len()].clone())
    }

    /// Number of addresses
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Always false: construction rejects empty lists.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
