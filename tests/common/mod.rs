//! Shared fakes: a scripted transport and an in-memory catalog

#![allow(dead_code)]

use async_trait::async_trait;
use catalog_scraper::cancel::{self, sleep_or_cancel, CancellationToken};
use catalog_scraper::catalog::{ApiError, CatalogApi, CatalogResult, PageRequest, RawProduct};
use catalog_scraper::transport::{Transport, TransportResult};
use catalog_scraper::{Category, StoreInfo};
use reqwest::{Method, Request, Response, Url};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

type Handler = dyn Fn(&Request, usize) -> TransportResult<Response> + Send + Sync;

/// Transport answering from a closure of (request, call index)
pub struct MockTransport {
    handler: Box<Handler>,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    urls: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new(handler: impl Fn(&Request, usize) -> TransportResult<Response> + Send + Sync + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
        }
    }

    /// Answer call N with `statuses[N]`; the last status repeats.
    pub fn statuses(statuses: &'static [u16]) -> Self {
        Self::new(move |_, index| {
            let status = statuses[index.min(statuses.len() - 1)];
            Ok(response(status, "{}"))
        })
    }

    /// Hold every call for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: Request, cancel: &CancellationToken) -> TransportResult<Response> {
        cancel::check(cancel)?;
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(request.url().to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let waited = if self.delay.is_zero() {
            Ok(())
        } else {
            sleep_or_cancel(self.delay, cancel).await
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        waited?;

        (self.handler)(&request, index)
    }
}

pub fn response(status: u16, body: impl Into<String>) -> Response {
    Response::from(http::Response::builder().status(status).body(body.into()).unwrap())
}

pub fn response_with_header(status: u16, name: &str, value: &str, body: impl Into<String>) -> Response {
    Response::from(
        http::Response::builder()
            .status(status)
            .header(name, value)
            .body(body.into())
            .unwrap(),
    )
}

pub fn json_response(status: u16, value: Value) -> Response {
    response(status, value.to_string())
}

pub fn get(url: &str) -> Request {
    Request::new(Method::GET, Url::parse(url).unwrap())
}

/// Raw product with a name, price and relative permalink
pub fn raw_product(name: &str) -> RawProduct {
    let fields = json!({
        "name": name,
        "price": 100,
        "permalink": format!("/products/{}", name.to_lowercase()),
    });
    RawProduct::new(as_map(fields))
}

pub fn tagged_product(name: &str, slug: &str) -> RawProduct {
    let mut raw = raw_product(name);
    raw.department_slug = Some(slug.to_string());
    raw
}

pub fn as_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

pub fn category(id: i64, parent_id: i64, slug: &str, children: Vec<Category>) -> Category {
    Category {
        id,
        parent_id,
        name: slug.to_string(),
        slug: slug.to_string(),
        has_children: !children.is_empty(),
        children,
        ..Default::default()
    }
}

/// `produce` department with `apples` and `pears` leaves, plus a root leaf
pub fn produce_tree() -> Vec<Category> {
    vec![
        category(
            100,
            0,
            "produce",
            vec![
                category(12345, 100, "apples", vec![]),
                category(12346, 100, "pears", vec![]),
            ],
        ),
        category(200, 0, "promo", vec![]),
    ]
}

/// In-memory catalog
#[derive(Default)]
pub struct FakeCatalog {
    pub categories: Vec<Category>,
    pub categories_error: Option<u16>,
    pub stores: HashMap<i64, StoreInfo>,
    /// Pages per department slug, page 1 first
    pub pages: HashMap<String, Vec<Vec<RawProduct>>>,
    /// Page that answers with a 500
    pub failing_page: Option<u32>,
    pub page_calls: Mutex<Vec<(String, u32, u32)>>,
}

impl FakeCatalog {
    pub fn with_pages(slug: &str, pages: Vec<Vec<RawProduct>>) -> Self {
        let mut fake = Self::default();
        fake.pages.insert(slug.to_string(), pages);
        fake
    }

    /// Department `slug` whose pages carry `sizes[i]` products each
    pub fn with_page_sizes(slug: &str, sizes: &[usize]) -> Self {
        let pages = sizes
            .iter()
            .enumerate()
            .map(|(page, size)| (0..*size).map(|i| raw_product(&format!("p{page}-{i}"))).collect())
            .collect();
        Self::with_pages(slug, pages)
    }

    pub fn page_calls(&self) -> Vec<(String, u32, u32)> {
        self.page_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CatalogApi for FakeCatalog {
    async fn list_categories(&self, _store_id: i64, cancel: &CancellationToken) -> CatalogResult<Vec<Category>> {
        cancel::check(cancel)?;
        if let Some(status) = self.categories_error {
            return Err(ApiError::from_body(status, r#"{"message":"upstream says no"}"#).into());
        }
        Ok(self.categories.clone())
    }

    async fn get_store(&self, store_id: i64, cancel: &CancellationToken) -> CatalogResult<StoreInfo> {
        cancel::check(cancel)?;
        self.stores
            .get(&store_id)
            .cloned()
            .ok_or_else(|| ApiError::from_body(404, r#"{"message":"store not found"}"#).into())
    }

    async fn list_products(
        &self,
        _store_id: i64,
        request: PageRequest<'_>,
        cancel: &CancellationToken,
    ) -> CatalogResult<Vec<RawProduct>> {
        cancel::check(cancel)?;
        self.page_calls.lock().unwrap().push((
            request.department_slug.to_string(),
            request.page,
            request.per_page,
        ));
        if self.failing_page == Some(request.page) {
            return Err(ApiError::from_body(500, "boom").into());
        }
        Ok(self
            .pages
            .get(request.department_slug)
            .and_then(|pages| pages.get(request.page as usize - 1))
            .cloned()
            .unwrap_or_default())
    }
}
