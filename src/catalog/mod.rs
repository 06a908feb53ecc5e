//! Upstream catalog API
//!
//! - [`client::CatalogClient`] - typed calls over a [`Transport`](crate::transport::Transport)
//! - [`shapes`] - multi-shape product page parsing
//! - [`normalize`] - raw product → [`Product`](crate::Product)
//! - [`resolver`] - category id → department / leaf slug
//! - [`pagination::CategoryProductsService`] - paginated collection

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

use crate::cancel::{CancellationToken, Cancelled};
use crate::transport::TransportError;
use crate::{Category, StoreInfo};

pub mod client;
pub mod normalize;
pub mod pagination;
pub mod resolver;
pub mod shapes;

pub use client::CatalogClient;
pub use pagination::{CategoryProductsService, PaginationSettings};
pub use resolver::DepartmentTarget;
pub use shapes::{ProductShape, RawProduct};

/// Default upstream base URL.
pub const DEFAULT_BASE_URL: &str = "https://kuper.ru";

/// Structured upstream error: HTTP status plus the optional `code` and
/// `message` fields of a JSON error body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    /// HTTP status of the response
    pub status: u16,
    /// Upstream error code, any JSON value
    pub code: Option<Value>,
    /// Upstream error message
    pub message: Option<String>,
    /// Raw (trimmed) response body
    pub body: String,
}

impl ApiError {
    /// Rebuild an error from a response body. `code`/`message` are picked
    /// up when the body is a JSON object carrying them.
    pub fn from_body(status: u16, body: &str) -> Self {
        let body = body.trim();
        let mut error = Self {
            status,
            code: None,
            message: None,
            body: body.to_string(),
        };

        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
            error.code = map.get("code").cloned();
            error.message = map.get("message").and_then(Value::as_str).map(str::to_string);
        }
        error
    }

    /// Attach a message when the body carried none.
    pub fn with_default_message(mut self, message: &str) -> Self {
        if self.message.is_none() {
            self.message = Some(message.to_string());
        }
        self
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = self
            .code
            .as_ref()
            .map(|c| match c {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| "<nil>".to_string());
        let message = self.message.as_deref().unwrap_or(&self.body);
        write!(f, "api error: status={} code={} message={}", self.status, code, message)
    }
}

impl std::error::Error for ApiError {}

/// Catalog operation errors
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Transport failure (network, exhausted retries, proxy, cancellation)
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Upstream answered with an error
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Caller passed an unusable argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Response body could not be decoded
    #[error("parse error: {0}")]
    Parse(String),

    /// The category id does not occur in the store's tree
    #[error("categoryID={category_id} not found for storeID={store_id}")]
    CategoryNotFound {
        /// Store searched
        store_id: i64,
        /// Category looked for
        category_id: i64,
    },

    /// The category exists but has no slug to address it by
    #[error("categoryID={category_id} found but slug empty")]
    EmptySlug {
        /// Category found
        category_id: i64,
    },

    /// Pagination accumulated more products than allowed
    #[error("too many products parsed (> {limit}): possible infinite pagination")]
    SafetyLimit {
        /// Configured ceiling
        limit: usize,
    },

    /// A page fetch failed
    #[error("list products slug={slug} page={page}: {source}")]
    Page {
        /// Department slug requested
        slug: String,
        /// 1-based page number
        page: u32,
        /// Underlying failure
        #[source]
        source: Box<CatalogError>,
    },

    /// The operation was cancelled
    #[error("operation cancelled")]
    Cancelled,
}

impl From<Cancelled> for CatalogError {
    fn from(_: Cancelled) -> Self {
        CatalogError::Cancelled
    }
}

impl CatalogError {
    /// Upstream HTTP status behind this failure, if any. Looks through page
    /// wrappers and exhausted retries, so a 429 that outlived the retry
    /// budget still reports 429.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            CatalogError::Api(e) => Some(e.status),
            CatalogError::Transport(e) => e.status().map(|s| s.as_u16()),
            CatalogError::Page { source, .. } => source.upstream_status(),
            _ => None,
        }
    }

    /// Whether the failure originates upstream (transport or API error).
    pub fn is_upstream(&self) -> bool {
        match self {
            CatalogError::Api(_) => true,
            CatalogError::Transport(e) => !e.is_cancelled(),
            CatalogError::Page { source, .. } => source.is_upstream(),
            _ => false,
        }
    }

    /// Whether the requested category could not be resolved.
    pub fn is_unresolved_category(&self) -> bool {
        matches!(
            self,
            CatalogError::CategoryNotFound { .. } | CatalogError::EmptySlug { .. }
        )
    }

    /// Whether the failure was caused by cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            CatalogError::Cancelled => true,
            CatalogError::Transport(e) => e.is_cancelled(),
            CatalogError::Page { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

/// Result type for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;

/// One page request against the department listing endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest<'a> {
    /// Department slug addressed
    pub department_slug: &'a str,
    /// 1-based page number
    pub page: u32,
    /// Requested page size
    pub per_page: u32,
    /// Offers per product
    pub offers_limit: u32,
}

/// Typed upstream operations
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Full category tree of a store
    async fn list_categories(&self, store_id: i64, cancel: &CancellationToken) -> CatalogResult<Vec<Category>>;

    /// Store metadata; a 404 means the store does not exist
    async fn get_store(&self, store_id: i64, cancel: &CancellationToken) -> CatalogResult<StoreInfo>;

    /// One page of raw products for a department
    async fn list_products(
        &self,
        store_id: i64,
        request: PageRequest<'_>,
        cancel: &CancellationToken,
    ) -> CatalogResult<Vec<RawProduct>>;
}
