//! Base transport: one request, one network call.
//!
//! No retry and no admission control happen here. When a [`ProxyRouter`]
//! is configured the proxy is selected per request, and one reqwest client
//! is kept per distinct proxy address so connection pools stay warm.

use async_trait::async_trait;
use reqwest::{Client, Request, Response, Url};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

use super::{Transport, TransportError, TransportResult};
use crate::cancel::{self, CancellationToken};
use crate::metrics::HttpRequestMetrics;
use crate::proxy::ProxyRouter;

/// Settings applied to every reqwest client the transport builds
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Whole-request timeout
    pub timeout: Duration,
    /// TCP connect timeout
    pub connect_timeout: Duration,
    /// How long idle pooled connections are kept
    pub pool_idle_timeout: Duration,
    /// Maximum idle connections per host
    pub pool_max_idle_per_host: usize,
    /// Keep cookies between requests
    pub cookie_store: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 20,
            cookie_store: true,
        }
    }
}

impl ClientSettings {
    /// Settings with a custom whole-request timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    fn build_client(&self, proxy: Option<&Url>) -> TransportResult<Client> {
        let mut builder = Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .pool_idle_timeout(self.pool_idle_timeout)
            .pool_max_idle_per_host(self.pool_max_idle_per_host)
            .cookie_store(self.cookie_store);

        builder = match proxy {
            Some(url) => builder.proxy(
                reqwest::Proxy::all(url.clone())
                    .map_err(|e| TransportError::Config(format!("invalid proxy {url}: {e}")))?,
            ),
            // Never pick up HTTP(S)_PROXY from the environment: routing is
            // decided by the router only.
            None => builder.no_proxy(),
        };

        builder
            .build()
            .map_err(|e| TransportError::Config(format!("failed to build HTTP client: {e}")))
    }
}

/// Executes a single HTTP request
pub struct HttpTransport {
    settings: ClientSettings,
    direct: Client,
    router: Option<ProxyRouter>,
    proxied: Mutex<HashMap<String, Client>>,
}

impl HttpTransport {
    /// Create a base transport. `router` selects a proxy per request; `None`
    /// sends everything directly.
    pub fn new(settings: ClientSettings, router: Option<ProxyRouter>) -> TransportResult<Self> {
        let direct = settings.build_client(None)?;
        Ok(Self {
            settings,
            direct,
            router,
            proxied: Mutex::new(HashMap::new()),
        })
    }

    /// Direct transport without proxy routing
    pub fn direct(settings: ClientSettings) -> TransportResult<Self> {
        Self::new(settings, None)
    }

    async fn client_for(&self, cancel: &CancellationToken) -> TransportResult<Client> {
        let Some(router) = &self.router else {
            return Ok(self.direct.clone());
        };

        match router.resolve(cancel).await? {
            Some(proxy) => self.proxied_client(&proxy),
            None => Ok(self.direct.clone()),
        }
    }

    fn proxied_client(&self, proxy: &Url) -> TransportResult<Client> {
        let key = proxy.as_str().to_string();
        let mut clients = self
            .proxied
            .lock()
            .map_err(|_| TransportError::Config("proxy client cache poisoned".to_string()))?;

        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }

        let client = self.settings.build_client(Some(proxy))?;
        debug!(proxy_host = proxy.host_str().unwrap_or(""), "Built client for proxy");
        clients.insert(key, client.clone());
        Ok(client)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: Request, cancel: &CancellationToken) -> TransportResult<Response> {
        cancel::check(cancel)?;

        let client = self.client_for(cancel).await?;
        let metrics = HttpRequestMetrics::start(request.url().path());

        match client.execute(request).await {
            Ok(response) => {
                metrics.record_complete(response.status().as_u16());
                Ok(response)
            }
            Err(e) => {
                metrics.record_network_error();
                Err(TransportError::Network(e))
            }
        }
    }
}
