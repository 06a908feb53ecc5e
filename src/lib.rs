//! # Catalog Scraper Library
//!
//! Fetches a retail catalog (store metadata, category tree, paginated product
//! listings) from a single rate-limited upstream API, normalizes the loosely
//! typed JSON payloads, and persists or serves the results.
//!
//! ## Quick Start
//!
//! ```no_run
//! use catalog_scraper::cancel::CancellationToken;
//! use catalog_scraper::catalog::{CatalogClient, CategoryProductsService, PaginationSettings};
//! use catalog_scraper::transport::{self, TransportOptions};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = transport::build(TransportOptions {
//!     concurrency: 5,
//!     ..TransportOptions::default()
//! })?;
//! let client = CatalogClient::new(transport, "https://kuper.ru")?;
//! let base_url = client.base_url().to_string();
//! let service = CategoryProductsService::new(
//!     Arc::new(client),
//!     base_url,
//!     PaginationSettings::default(),
//! );
//!
//! let cancel = CancellationToken::new();
//! let (products, slug) = service.get_by_category_id(86, 12345, &cancel).await?;
//! println!("{slug}: {} products", products.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`transport`] - layered request pipeline (base, retry, concurrency)
//! - [`proxy`] - per-request proxy selection (static list or rotation URL)
//! - [`catalog`] - typed upstream calls, category resolution and pagination
//! - [`scan`] - fan-out scan over a range of store identifiers
//! - [`output`] - result documents and atomic JSON persistence
//! - [`server`] - HTTP API over the catalog operations
//! - [`cli`] - command implementations for the binary

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Deserializer, Serialize};

/// Cooperative cancellation
pub mod cancel;

/// Upstream catalog API, category resolution and pagination
pub mod catalog;

/// CLI command implementations
pub mod cli;

/// Configuration loading
pub mod config;

/// Prometheus metrics
pub mod metrics;

/// Result documents and persistence
pub mod output;

/// Outbound proxy selection
pub mod proxy;

/// Store identifier scan
pub mod scan;

/// HTTP API
pub mod server;

/// HTTP request pipeline
pub mod transport;

/// Treat an explicit JSON `null` like a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Node of the store category tree
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Category {
    /// Category identifier
    #[serde(deserialize_with = "null_as_default")]
    pub id: i64,
    /// Parent identifier (0 for roots)
    #[serde(deserialize_with = "null_as_default")]
    pub parent_id: i64,
    /// Upstream node type
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub kind: String,
    /// Display name
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    /// URL slug; departments are addressed by it
    #[serde(deserialize_with = "null_as_default")]
    pub slug: String,
    /// Number of products reported upstream
    #[serde(deserialize_with = "null_as_default")]
    pub products_count: i64,
    /// Upstream category type
    #[serde(deserialize_with = "null_as_default")]
    pub category_type: String,
    /// Branch flag as reported upstream
    #[serde(deserialize_with = "null_as_default")]
    pub has_children: bool,
    /// Child nodes in upstream order
    #[serde(deserialize_with = "null_as_default")]
    pub children: Vec<Category>,
}

impl Category {
    /// A department is any branch node: flagged as having children or
    /// actually carrying some.
    pub fn is_department(&self) -> bool {
        self.has_children || !self.children.is_empty()
    }
}

/// Store metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreInfo {
    /// Store identifier
    pub store_id: i64,
    /// Store name (falls back to the full name)
    pub store_name: String,
    /// Address (falls back to "city, street building")
    pub store_address: String,
    /// Retailer name
    pub retailer_name: String,
}

/// Normalized product record
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Product {
    /// Display name
    pub name: String,
    /// Price as a plain decimal string, e.g. `"89.9"`
    pub price: String,
    /// Absolute product URL
    pub url: String,
}

impl Product {
    /// True when no field could be extracted.
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.price.is_empty() && self.url.is_empty()
    }
}
