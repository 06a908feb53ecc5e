//! Rotation endpoint provider with a TTL cache
//!
//! The rotation URL answers with one proxy address, either as plain text,
//! as a JSON object with a `proxy`, `url` or `data` string field, or as a
//! JSON array whose first element is the address. The result is cached for
//! the configured TTL; callers inside the window never touch the network.

use reqwest::header::{HeaderValue, ACCEPT};
use reqwest::{Method, Request, Url};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use super::ProxyError;
use crate::cancel::CancellationToken;
use crate::transport::{ClientSettings, HttpTransport, Transport, TransportError};

/// Timeout for one rotation fetch.
pub const ROTATION_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum rotation response size that is read.
const ROTATION_BODY_LIMIT: usize = 64 * 1024;

#[derive(Debug, Clone)]
struct CachedProxy {
    address: String,
    expires_at: Instant,
}

/// Proxy address fetched from a rotation endpoint and cached for a TTL
pub struct RotationProvider {
    url: Url,
    ttl: Duration,
    transport: Arc<dyn Transport>,
    cache: Mutex<Option<CachedProxy>>,
}

impl RotationProvider {
    /// Provider fetching `rotation_url` directly (never through a proxy).
    pub fn new(rotation_url: &str, ttl: Duration) -> Result<Self, ProxyError> {
        let transport = HttpTransport::direct(ClientSettings::with_timeout(ROTATION_FETCH_TIMEOUT))
            .map_err(|e| ProxyError::Rotation(e.to_string()))?;
        Self::with_transport(rotation_url, ttl, Arc::new(transport))
    }

    /// Provider fetching through a caller-supplied transport.
    pub fn with_transport(
        rotation_url: &str,
        ttl: Duration,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ProxyError> {
        let url = Url::parse(rotation_url.trim()).map_err(|e| ProxyError::InvalidAddress {
            address: rotation_url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            url,
            ttl,
            transport,
            cache: Mutex::new(None),
        })
    }

    /// Cache lifetime
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached address while fresh, otherwise a refresh fetch.
    ///
    /// The cache lock only guards the read and the store. Callers that miss
    /// the cache at the same time each fetch on their own, so a slow or
    /// failing rotation endpoint never makes them wait in line; the last
    /// successful fetch wins the cache.
    pub async fn next(&self, cancel: &CancellationToken) -> Result<String, ProxyError> {
        if let Some(address) = self.cached().await {
            return Ok(address);
        }

        let address = self.fetch(cancel).await?;
        debug!(ttl_secs = self.ttl.as_secs(), "Rotated proxy address");
        *self.cache.lock().await = Some(CachedProxy {
            address: address.clone(),
            expires_at: Instant::now() + self.ttl,
        });
        Ok(address)
    }

    async fn cached(&self) -> Option<String> {
        let cache = self.cache.lock().await;
        cache
            .as_ref()
            .filter(|cached| Instant::now() < cached.expires_at)
            .map(|cached| cached.address.clone())
    }

    async fn fetch(&self, cancel: &CancellationToken) -> Result<String, ProxyError> {
        let mut request = Request::new(Method::GET, self.url.clone());
        request.headers_mut().insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );

        let mut response = self
            .transport
            .execute(request, cancel)
            .await
            .map_err(|e| match e {
                TransportError::Cancelled => ProxyError::Cancelled,
                other => ProxyError::Rotation(other.to_string()),
            })?;

        let status = response.status();
        let mut body = Vec::new();
        while body.len() < ROTATION_BODY_LIMIT {
            match response.chunk().await {
                Ok(Some(chunk)) => body.extend_from_slice(&chunk),
                Ok(None) => break,
                Err(e) => return Err(ProxyError::Rotation(e.to_string())),
            }
        }
        body.truncate(ROTATION_BODY_LIMIT);
        let text = String::from_utf8_lossy(&body);

        if !status.is_success() {
            return Err(ProxyError::RotationStatus {
                status: status.as_u16(),
                body: text.trim().to_string(),
            });
        }

        parse_rotation_body(&text).ok_or(ProxyError::Empty)
    }
}

/// Extract the proxy address from a rotation response body.
pub fn parse_rotation_body(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    let address = if body.starts_with('{') {
        let value: Value = serde_json::from_str(body).ok()?;
        ["proxy", "url", "data"]
            .iter()
            .find_map(|key| value.get(*key).and_then(Value::as_str))?
            .to_string()
    } else if body.starts_with('[') {
        let value: Value = serde_json::from_str(body).ok()?;
        value.get(0)?.as_str()?.to_string()
    } else {
        body.to_string()
    };

    let address = address.trim();
    (!address.is_empty()).then(|| address.to_string())
}
