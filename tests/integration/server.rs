//! HTTP API handlers over an in-memory catalog

use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use catalog_scraper::catalog::{CatalogApi, CategoryProductsService, PaginationSettings};
use catalog_scraper::server::{routes, AppState};
use catalog_scraper::StoreInfo;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::common::{produce_tree, tagged_product, FakeCatalog};

fn catalog() -> FakeCatalog {
    let mut fake = FakeCatalog::with_pages(
        "produce",
        vec![vec![
            tagged_product("Gala", "apples"),
            tagged_product("Bosc", "pears"),
            tagged_product("Fuji", "apples"),
        ]],
    );
    fake.categories = produce_tree();
    fake.stores.insert(
        86,
        StoreInfo {
            store_id: 86,
            store_name: "Corner Market".into(),
            store_address: "Main st 1".into(),
            retailer_name: "Market Group".into(),
        },
    );
    fake
}

fn state(fake: FakeCatalog, default_store_id: i64) -> web::Data<AppState> {
    let api: Arc<dyn CatalogApi> = Arc::new(fake);
    web::Data::new(AppState {
        products: Arc::new(CategoryProductsService::new(
            api.clone(),
            "https://shop.test",
            PaginationSettings::default(),
        )),
        api,
        default_store_id,
        timeout: Duration::from_secs(5),
    })
}

async fn get(state: web::Data<AppState>, uri: &str) -> (StatusCode, Value) {
    let app = test::init_service(App::new().app_data(state).configure(routes::configure_routes)).await;
    let response = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
    let status = response.status();
    let body: Value = test::read_body_json(response).await;
    (status, body)
}

#[actix_web::test]
async fn test_health() {
    let (status, body) = get(state(catalog(), 0), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({"status": "ok"}));
}

#[actix_web::test]
async fn test_categories_are_flattened_without_root_leaves() {
    let (status, body) = get(state(catalog(), 0), "/categories?storeID=86").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["store_id"], 86);
    assert_eq!(body["count"], 3);

    let rows: Vec<(i64, i64)> = body["categories"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| (c["id"].as_i64().unwrap(), c["level"].as_i64().unwrap()))
        .collect();
    assert_eq!(rows, [(100, 0), (12345, 1), (12346, 1)]);
}

#[actix_web::test]
async fn test_products_for_leaf_category() {
    let (status, body) = get(state(catalog(), 0), "/products?storeid=86&categoryID=12345").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["store"]["name"], "Corner Market");
    assert_eq!(body["category"]["slug"], "apples");
    assert_eq!(body["products"][1]["name"], "Fuji");
}

#[actix_web::test]
async fn test_default_store_and_best_effort_store_info() {
    let mut fake = catalog();
    fake.stores.clear();

    let (status, body) = get(state(fake, 86), "/products?categoryid=100").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);
    assert!(body.get("store").is_none());
}

#[actix_web::test]
async fn test_bad_requests() {
    let cases = [
        ("/products?storeID=86", "categoryID is required"),
        ("/products?storeID=abc&categoryID=1", "storeID must be integer"),
        ("/products?storeID=86&categoryID=-4", "categoryID must be > 0"),
        ("/categories", "storeID must be > 0"),
    ];
    for (uri, message) in cases {
        let (status, body) = get(state(catalog(), 0), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["error"]["code"], "bad_request", "{uri}");
        assert_eq!(body["error"]["message"], message, "{uri}");
    }
}

#[actix_web::test]
async fn test_unknown_category_is_not_found() {
    let (status, body) = get(state(catalog(), 0), "/products?storeID=86&categoryID=999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

#[actix_web::test]
async fn test_upstream_failures_are_mapped() {
    let mut limited = catalog();
    limited.categories_error = Some(429);
    let (status, body) = get(state(limited, 0), "/categories?storeID=86").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "rate_limited");

    let mut broken = catalog();
    broken.categories_error = Some(500);
    let (status, body) = get(state(broken, 0), "/categories?storeID=86").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "upstream_error");
}
