//! HTTP API over the catalog operations (actix-web)
//!
//! Routes:
//! - `GET /health`
//! - `GET /categories?storeID=`
//! - `GET /products?storeID=&categoryID=`
//!
//! Errors are returned as `{"error":{"code","message"}}`.

use actix_web::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use actix_web::http::StatusCode;
use actix_web::middleware::{DefaultHeaders, Logger};
use actix_web::{web, App, HttpResponse, HttpServer, ResponseError};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::catalog::{CatalogApi, CatalogError, CategoryProductsService};

pub mod handlers;
pub mod routes;

/// Transport concurrency used by the API server
pub const SERVER_CONCURRENCY: usize = 10;

/// Shared handler state
pub struct AppState {
    /// Upstream API (categories and store lookups)
    pub api: Arc<dyn CatalogApi>,
    /// Category products use case
    pub products: Arc<CategoryProductsService>,
    /// Store used when a request names none (0 = required)
    pub default_store_id: i64,
    /// Deadline for one request
    pub timeout: Duration,
}

/// API error, rendered as `{"error":{"code","message"}}`
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Invalid query parameters
    #[error("{0}")]
    BadRequest(String),

    /// Store or category does not exist
    #[error("{0}")]
    NotFound(String),

    /// Upstream kept answering 429
    #[error("too many requests")]
    RateLimited,

    /// Upstream failed
    #[error("{0}")]
    Upstream(String),

    /// Anything else
    #[error("internal error")]
    Internal,
}

impl ServerError {
    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            ServerError::BadRequest(_) => "bad_request",
            ServerError::NotFound(_) => "not_found",
            ServerError::RateLimited => "rate_limited",
            ServerError::Upstream(_) => "upstream_error",
            ServerError::Internal => "internal_error",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    code: &'a str,
    message: String,
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ServerError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ServerError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header((CONTENT_TYPE, "application/json; charset=utf-8"))
            .json(ErrorBody {
                error: ErrorDetail {
                    code: self.code(),
                    message: self.to_string(),
                },
            })
    }
}

impl From<CatalogError> for ServerError {
    fn from(err: CatalogError) -> Self {
        if err.is_unresolved_category() {
            return ServerError::NotFound(err.to_string());
        }
        if let CatalogError::InvalidArgument(msg) = &err {
            return ServerError::BadRequest(msg.clone());
        }
        match err.upstream_status() {
            Some(404) => return ServerError::NotFound(not_found_message(&err)),
            Some(429) => return ServerError::RateLimited,
            _ => {}
        }
        if err.is_upstream() || matches!(err, CatalogError::Parse(_)) {
            return ServerError::Upstream(err.to_string());
        }
        error!(error = %err, "Request failed");
        ServerError::Internal
    }
}

fn not_found_message(err: &CatalogError) -> String {
    fn api_message(err: &CatalogError) -> Option<String> {
        match err {
            CatalogError::Api(api) => api.message.clone(),
            CatalogError::Page { source, .. } => api_message(source),
            _ => None,
        }
    }
    api_message(err).unwrap_or_else(|| "not found".to_string())
}

/// Run the server until it is stopped (SIGINT/SIGTERM are handled by
/// actix-web).
pub async fn run(host: &str, port: u16, state: AppState) -> std::io::Result<()> {
    let state = web::Data::new(state);

    info!(host, port, "Starting catalog API server");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(DefaultHeaders::new().add((CACHE_CONTROL, "no-store")))
            .wrap(Logger::new("%a \"%r\" %s %b %Dms"))
            .configure(routes::configure_routes)
    })
    .bind((host, port))?
    .run()
    .await
}
