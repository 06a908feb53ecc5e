//! Store identifier scan over the real client

use catalog_scraper::cancel::{cancel_after, CancellationToken};
use catalog_scraper::catalog::CatalogClient;
use catalog_scraper::output::{JsonRepository, StoresResult};
use catalog_scraper::scan::StoreScanner;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::common::{json_response, response, MockTransport};

/// Every seventh identifier exists; 13 answers 500.
fn upstream() -> Arc<MockTransport> {
    Arc::new(MockTransport::new(|request, _| {
        let id: i64 = request
            .url()
            .path()
            .trim_start_matches("/api/stores/")
            .parse()
            .unwrap();
        Ok(match id {
            13 => response(500, "internal"),
            id if id % 7 == 0 => json_response(
                200,
                json!({"store": {"id": id, "name": format!("Store {id}"), "location": {"full_address": "Main st"}}}),
            ),
            _ => response(404, r#"{"message":"store not found"}"#),
        })
    }))
}

#[tokio::test]
async fn test_scan_collects_found_stores_sorted() {
    let mock = upstream();
    let client = CatalogClient::new(mock.clone(), "https://shop.test").unwrap();
    let scanner = StoreScanner::new(Arc::new(client), 8);

    let report = scanner.scan(1, 50, &CancellationToken::new()).await.unwrap();

    let ids: Vec<i64> = report.stores.iter().map(|s| s.id).collect();
    assert_eq!(ids, [7, 14, 21, 28, 35, 42, 49]);
    assert_eq!(report.scanned, 50);
    assert_eq!(report.found, 7);
    assert!(!report.cancelled);
    assert_eq!(report.stores[0].name, "Store 7");
    assert_eq!(mock.calls(), 50);

    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("stores.json");
    JsonRepository::new(&path)
        .save_stores(&StoresResult::new(report.stores))
        .unwrap();
    let saved: StoresResult = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(saved.count, 7);
    assert_eq!(saved.stores[6].address, "Main st");
}

#[tokio::test]
async fn test_single_identifier_range() {
    let client = CatalogClient::new(upstream(), "https://shop.test").unwrap();
    let report = StoreScanner::new(Arc::new(client), 40)
        .scan(14, 14, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.scanned, 1);
    assert_eq!(report.stores.len(), 1);
}

#[tokio::test]
async fn test_cancelled_scan_returns_partial_report() {
    let mock = Arc::new(
        MockTransport::new(|_, _| Ok(response(404, ""))).with_delay(Duration::from_millis(20)),
    );
    let client = CatalogClient::new(mock.clone(), "https://shop.test").unwrap();
    let scanner = StoreScanner::new(Arc::new(client), 4);
    let cancel = CancellationToken::new();
    cancel_after(&cancel, Duration::from_millis(50));

    let report = scanner.scan(1, 100_000, &cancel).await.unwrap();

    assert!(report.cancelled);
    assert!(report.scanned < 100_000);
    assert!(report.stores.is_empty());
}
