//! Typed calls against the upstream catalog API

use async_trait::async_trait;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, ORIGIN, REFERER, USER_AGENT,
};
use reqwest::{Method, Request, Response, StatusCode, Url};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use super::shapes::{parse_products_page, RawProduct};
use super::{ApiError, CatalogApi, CatalogError, CatalogResult, PageRequest, DEFAULT_BASE_URL};
use crate::cancel::{self, CancellationToken};
use crate::null_as_default;
use crate::transport::{Transport, TransportError};
use crate::{Category, StoreInfo};

const STORE_BODY_LIMIT: usize = 256 * 1024;
const CATEGORIES_BODY_LIMIT: usize = 512 * 1024;
const PRODUCTS_BODY_LIMIT: usize = 4 * 1024 * 1024;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/144.0.0.0 Safari/537.36";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StoreEnvelope {
    store: StoreBody,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StoreBody {
    #[serde(deserialize_with = "null_as_default")]
    id: i64,
    #[serde(deserialize_with = "null_as_default")]
    name: String,
    #[serde(deserialize_with = "null_as_default")]
    full_name: String,
    #[serde(deserialize_with = "null_as_default")]
    location: LocationBody,
    #[serde(deserialize_with = "null_as_default")]
    retailer: RetailerBody,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LocationBody {
    #[serde(deserialize_with = "null_as_default")]
    full_address: String,
    #[serde(deserialize_with = "null_as_default")]
    city: String,
    #[serde(deserialize_with = "null_as_default")]
    street: String,
    #[serde(deserialize_with = "null_as_default")]
    building: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RetailerBody {
    #[serde(deserialize_with = "null_as_default")]
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CategoriesEnvelope {
    #[serde(deserialize_with = "null_as_default")]
    categories: Vec<Category>,
}

impl From<StoreBody> for StoreInfo {
    fn from(store: StoreBody) -> Self {
        let address = if store.location.full_address.is_empty() {
            format!(
                "{}, {} {}",
                store.location.city, store.location.street, store.location.building
            )
            .trim()
            .to_string()
        } else {
            store.location.full_address
        };
        let name = if store.name.is_empty() {
            store.full_name
        } else {
            store.name
        };

        StoreInfo {
            store_id: store.id,
            store_name: name,
            store_address: address,
            retailer_name: store.retailer.name,
        }
    }
}

/// Catalog API client over a decorated [`Transport`]
pub struct CatalogClient {
    transport: Arc<dyn Transport>,
    base_url: String,
    headers: HeaderMap,
}

impl CatalogClient {
    /// Create a client. An empty `base_url` selects [`DEFAULT_BASE_URL`];
    /// trailing slashes are removed.
    pub fn new(transport: Arc<dyn Transport>, base_url: &str) -> CatalogResult<Self> {
        let base_url = match base_url.trim().trim_end_matches('/') {
            "" => DEFAULT_BASE_URL.to_string(),
            url => url.to_string(),
        };
        Url::parse(&base_url)
            .map_err(|e| CatalogError::InvalidArgument(format!("base_url {base_url:?}: {e}")))?;

        let headers = default_headers(&base_url)?;
        Ok(Self {
            transport,
            base_url,
            headers,
        })
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, path_and_query: &str) -> CatalogResult<Request> {
        let url = Url::parse(&format!("{}{}", self.base_url, path_and_query))
            .map_err(|e| CatalogError::InvalidArgument(format!("url {path_and_query:?}: {e}")))?;
        let mut request = Request::new(Method::GET, url);
        *request.headers_mut() = self.headers.clone();
        Ok(request)
    }

    async fn get(
        &self,
        path_and_query: &str,
        limit: usize,
        cancel: &CancellationToken,
    ) -> CatalogResult<(StatusCode, Vec<u8>)> {
        let request = self.request(path_and_query)?;
        let response = self.transport.execute(request, cancel).await?;
        let status = response.status();
        let body = cancel::until_cancelled(cancel, read_limited(response, limit))
            .await?
            .map_err(TransportError::Network)?;
        debug!(path = path_and_query, status = status.as_u16(), bytes = body.len(), "Upstream response");
        Ok((status, body))
    }
}

fn default_headers(base_url: &str) -> CatalogResult<HeaderMap> {
    let invalid = |e: reqwest::header::InvalidHeaderValue| {
        CatalogError::InvalidArgument(format!("header from base_url: {e}"))
    };

    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("ru-RU,ru;q=0.9,en;q=0.8"));
    headers.insert(REFERER, HeaderValue::from_str(&format!("{base_url}/")).map_err(invalid)?);
    headers.insert(ORIGIN, HeaderValue::from_str(base_url).map_err(invalid)?);
    headers.insert("sec-fetch-site", HeaderValue::from_static("same-origin"));
    headers.insert("sec-fetch-mode", HeaderValue::from_static("cors"));
    headers.insert("sec-fetch-dest", HeaderValue::from_static("empty"));
    Ok(headers)
}

/// Read at most `limit` bytes of the body; the rest is discarded.
async fn read_limited(mut response: Response, limit: usize) -> Result<Vec<u8>, reqwest::Error> {
    let mut body = Vec::new();
    while body.len() < limit {
        match response.chunk().await? {
            Some(chunk) => body.extend_from_slice(&chunk),
            None => break,
        }
    }
    body.truncate(limit);
    Ok(body)
}

fn body_text(body: &[u8], max: usize) -> String {
    String::from_utf8_lossy(&body[..body.len().min(max)]).trim().to_string()
}

#[async_trait]
impl CatalogApi for CatalogClient {
    async fn list_categories(&self, store_id: i64, cancel: &CancellationToken) -> CatalogResult<Vec<Category>> {
        let path = format!("/api/v3/stores/{store_id}/categories");
        let (status, body) = self.get(&path, CATEGORIES_BODY_LIMIT, cancel).await?;

        if status != StatusCode::OK {
            return Err(ApiError::from_body(status.as_u16(), &body_text(&body, 4096))
                .with_default_message("list categories failed")
                .into());
        }

        let envelope: CategoriesEnvelope = serde_json::from_slice(&body)
            .map_err(|e| CatalogError::Parse(format!("list categories: {e}")))?;
        Ok(envelope.categories)
    }

    async fn get_store(&self, store_id: i64, cancel: &CancellationToken) -> CatalogResult<StoreInfo> {
        let path = format!("/api/stores/{store_id}");
        let (status, body) = self.get(&path, STORE_BODY_LIMIT, cancel).await?;

        if status != StatusCode::OK {
            return Err(ApiError::from_body(status.as_u16(), &body_text(&body, STORE_BODY_LIMIT))
                .with_default_message("store info status is not 200")
                .into());
        }

        let envelope: StoreEnvelope = serde_json::from_slice(&body)
            .map_err(|e| CatalogError::Parse(format!("store info: {e}")))?;
        Ok(envelope.store.into())
    }

    async fn list_products(
        &self,
        store_id: i64,
        request: PageRequest<'_>,
        cancel: &CancellationToken,
    ) -> CatalogResult<Vec<RawProduct>> {
        let path = format!(
            "/api/v3/stores/{}/departments/{}?offers_limit={}&page={}&per_page={}",
            store_id, request.department_slug, request.offers_limit, request.page, request.per_page
        );
        let (status, body) = self.get(&path, PRODUCTS_BODY_LIMIT, cancel).await?;

        if status != StatusCode::OK {
            return Err(ApiError::from_body(status.as_u16(), &body_text(&body, PRODUCTS_BODY_LIMIT)).into());
        }

        parse_products_page(status.as_u16(), &body)
    }
}
