//! Result documents and persistence

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::{Product, StoreInfo};

pub mod json;

pub use json::JsonRepository;

/// Output errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// No target path configured
    #[error("json repository: empty path")]
    EmptyPath,
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Current UTC time as RFC 3339 with second precision
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Store summary in result documents
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreMeta {
    /// Store identifier
    pub id: i64,
    /// Store name
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Store address
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub address: String,
    /// Retailer name
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub retailer_name: String,
}

impl From<StoreInfo> for StoreMeta {
    fn from(info: StoreInfo) -> Self {
        Self {
            id: info.store_id,
            name: info.store_name,
            address: info.store_address,
            retailer_name: info.retailer_name,
        }
    }
}

/// Category summary in result documents
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryMeta {
    /// Requested category identifier
    #[serde(default, skip_serializing_if = "is_zero")]
    pub id: i64,
    /// Slug actually used
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub slug: String,
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

/// Products of one category
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryResult {
    /// Fetch time (RFC 3339)
    pub fetched_at: String,
    /// Store metadata, when it could be fetched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<StoreMeta>,
    /// Category requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<CategoryMeta>,
    /// Normalized products
    pub products: Vec<Product>,
    /// Number of products
    pub count: usize,
}

impl CategoryResult {
    /// Build a result stamped with the current time.
    pub fn new(store: Option<StoreMeta>, category: Option<CategoryMeta>, products: Vec<Product>) -> Self {
        Self {
            fetched_at: timestamp_now(),
            store,
            category,
            count: products.len(),
            products,
        }
    }
}

/// Stores found by a scan
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoresResult {
    /// Scan completion time (RFC 3339)
    pub fetched_at: String,
    /// Stores sorted by id
    pub stores: Vec<StoreMeta>,
    /// Number of stores
    pub count: usize,
}

impl StoresResult {
    /// Build a result stamped with the current time.
    pub fn new(stores: Vec<StoreMeta>) -> Self {
        Self {
            fetched_at: timestamp_now(),
            count: stores.len(),
            stores,
        }
    }
}
