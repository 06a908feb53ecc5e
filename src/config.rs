//! YAML configuration with per-environment profiles
//!
//! The root document names the active environment and carries one profile
//! per environment:
//!
//! ```yaml
//! env: local            # local | dev | prod
//! proxy: { mode: disabled }
//! local:
//!   upstream: { base_url: https://kuper.ru, store_id: 86 }
//!   http: { timeout_seconds: 30, retries: 3 }
//! prod:
//!   log: { level: info, format: json }
//! ```
//!
//! Environment variables prefixed `CATALOG__` override file values, with
//! `__` separating path segments (`CATALOG__LOCAL__HTTP__RETRIES=5`).

use ::config::{Environment, File, FileFormat};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::catalog::{PaginationSettings, DEFAULT_BASE_URL};
use crate::proxy::ProxySettings;
use crate::transport::{ClientSettings, TransportOptions, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY};

/// Default configuration path
pub const DEFAULT_CONFIG_PATH: &str = "./config/config.yaml";

/// Prefix of overriding environment variables
pub const ENV_PREFIX: &str = "CATALOG";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read or deserialized
    #[error("failed to load config: {0}")]
    Load(#[from] ::config::ConfigError),

    /// `env` names no known profile
    #[error("unknown env={0:?} (expected local|dev|prod)")]
    UnknownEnv(String),
}

/// Logging section
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogConfig {
    /// debug | info | warn | error
    pub level: String,
    /// text | json
    pub format: String,
    /// Include file and line in records
    pub add_source: bool,
}

impl LogConfig {
    /// `EnvFilter` directive for the configured level
    pub fn filter_directive(&self) -> &'static str {
        match self.level.trim().to_lowercase().as_str() {
            "trace" => "trace",
            "debug" => "debug",
            "warn" | "warning" => "warn",
            "error" => "error",
            _ => "info",
        }
    }

    /// Whether records are emitted as JSON
    pub fn is_json(&self) -> bool {
        self.format.trim().eq_ignore_ascii_case("json")
    }
}

/// HTTP API listener
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host
    pub host: String,
    /// Bind port
    pub port: u16,
}

/// Upstream API location
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the catalog API
    pub base_url: String,
    /// Default store (0 = unset)
    pub store_id: i64,
}

/// Defaults for the `category` command
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CliConfig {
    /// Default category (0 = unset)
    pub category_id: i64,
    /// Default output path
    pub output_file: String,
    /// Deadline for one whole command
    pub deadline_seconds: u64,
}

/// Page size and bounds
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PaginationConfig {
    /// Entries per page, clamped to 1..=5
    pub per_page: i64,
    /// Offers per product
    pub offers_limit: i64,
    /// Page budget per department
    pub max_pages: i64,
    /// Product ceiling per fetch
    pub max_products: i64,
}

/// Transport section
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HttpConfig {
    /// Whole-request timeout
    pub timeout_seconds: i64,
    /// Retries after the first attempt
    pub retries: i64,
    /// Backoff base delay
    pub base_delay_ms: i64,
    /// Backoff cap
    pub max_delay_ms: i64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 0,
            retries: 3,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }
}

/// One environment profile, after defaults are applied
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Name of the selected environment
    #[serde(skip)]
    pub env: String,
    /// Logging
    pub log: LogConfig,
    /// HTTP API listener
    pub server: ServerConfig,
    /// Upstream API
    #[serde(alias = "kuper")]
    pub upstream: UpstreamConfig,
    /// `category` command defaults
    pub cli: CliConfig,
    /// Pagination
    pub pagination: PaginationConfig,
    /// Transport
    pub http: HttpConfig,
    /// Proxy selection
    pub proxy: ProxySettings,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RootConfig {
    env: String,
    proxy: ProxySettings,
    local: Config,
    dev: Config,
    prod: Config,
}

impl Config {
    /// Load `path` plus `CATALOG__*` environment overrides and select the
    /// profile named by `env`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let settings = ::config::Config::builder()
            .add_source(File::from(path.as_ref()).format(FileFormat::Yaml))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Self::from_root(settings.try_deserialize()?)
    }

    /// Parse a YAML document without environment overrides.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let settings = ::config::Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?;
        Self::from_root(settings.try_deserialize()?)
    }

    fn from_root(root: RootConfig) -> Result<Self, ConfigError> {
        let env = match root.env.trim().to_lowercase().as_str() {
            "" => "local".to_string(),
            other => other.to_string(),
        };

        let mut profile = match env.as_str() {
            "local" => root.local,
            "dev" => root.dev,
            "prod" => root.prod,
            _ => return Err(ConfigError::UnknownEnv(env)),
        };
        profile.env = env;

        if profile.proxy.is_empty() && !root.proxy.is_empty() {
            profile.proxy = root.proxy;
        }

        profile.apply_defaults();
        Ok(profile)
    }

    fn apply_defaults(&mut self) {
        let prod = self.env == "prod";

        if self.upstream.base_url.trim().is_empty() {
            self.upstream.base_url = DEFAULT_BASE_URL.to_string();
        }
        if self.server.host.trim().is_empty() {
            self.server.host = "0.0.0.0".to_string();
        }
        if self.server.port == 0 {
            self.server.port = 7891;
        }
        if self.cli.deadline_seconds == 0 {
            self.cli.deadline_seconds = 300;
        }

        let pagination = &mut self.pagination;
        pagination.per_page = pagination.per_page.clamp(0, 5);
        if pagination.per_page == 0 {
            pagination.per_page = 5;
        }
        if pagination.offers_limit <= 0 {
            pagination.offers_limit = 10;
        }
        if pagination.max_pages <= 0 {
            pagination.max_pages = 500;
        }
        if pagination.max_products <= 0 {
            pagination.max_products = 200_000;
        }

        let http = &mut self.http;
        if http.timeout_seconds <= 0 {
            http.timeout_seconds = 30;
        }
        if http.retries < 0 {
            http.retries = 0;
        }
        if http.base_delay_ms <= 0 {
            http.base_delay_ms = DEFAULT_BASE_DELAY.as_millis() as i64;
        }
        if http.max_delay_ms <= 0 {
            http.max_delay_ms = DEFAULT_MAX_DELAY.as_millis() as i64;
        }

        if self.log.level.trim().is_empty() {
            self.log.level = if prod { "info" } else { "debug" }.to_string();
        }
        if self.log.format.trim().is_empty() {
            self.log.format = if prod { "json" } else { "text" }.to_string();
        }

        let proxy = &mut self.proxy;
        proxy.mode = proxy.mode.trim().to_lowercase();
        if proxy.mode.is_empty() {
            proxy.mode = "disabled".to_string();
        }
        proxy.list = proxy
            .list
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if proxy.rotation_ttl_seconds == 0 {
            proxy.rotation_ttl_seconds = 10;
        }
    }

    /// Whole-request timeout
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_seconds.max(1) as u64)
    }

    /// Deadline for one CLI command
    pub fn cli_deadline(&self) -> Duration {
        Duration::from_secs(self.cli.deadline_seconds)
    }

    /// Pagination settings for the collector
    pub fn pagination_settings(&self) -> PaginationSettings {
        PaginationSettings::new(
            self.pagination.per_page.max(0) as u32,
            self.pagination.offers_limit.max(0) as u32,
            self.pagination.max_pages.max(0) as u32,
            self.pagination.max_products.max(0) as usize,
        )
    }

    /// Transport options for the given concurrency; proxy routing is added
    /// by the caller.
    pub fn transport_options(&self, concurrency: usize) -> TransportOptions {
        TransportOptions {
            client: ClientSettings::with_timeout(self.http_timeout()),
            proxy: None,
            retries: self.http.retries.max(0) as u32,
            concurrency,
            base_delay: Duration::from_millis(self.http.base_delay_ms.max(0) as u64),
            max_delay: Duration::from_millis(self.http.max_delay_ms.max(0) as u64),
        }
    }

    /// Listener address, if host and port form a valid socket address
    pub fn server_addr(&self) -> Option<SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port).parse().ok()
    }
}
