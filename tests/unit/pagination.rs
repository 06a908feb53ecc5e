//! Paginated collection over an in-memory catalog

use catalog_scraper::cancel::CancellationToken;
use catalog_scraper::catalog::{CatalogError, CategoryProductsService, PaginationSettings};
use std::sync::Arc;

use crate::common::{produce_tree, raw_product, tagged_product, FakeCatalog};

const BASE_URL: &str = "https://shop.test";

fn service(fake: &Arc<FakeCatalog>, settings: PaginationSettings) -> CategoryProductsService {
    CategoryProductsService::new(fake.clone(), BASE_URL, settings)
}

fn pages_requested(fake: &FakeCatalog) -> Vec<u32> {
    fake.page_calls().into_iter().map(|(_, page, _)| page).collect()
}

#[tokio::test]
async fn test_short_page_ends_collection() {
    let fake = Arc::new(FakeCatalog::with_page_sizes("produce", &[5, 5, 5, 3, 5]));
    let products = service(&fake, PaginationSettings::default())
        .get_by_slug(86, "produce", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(products.len(), 18);
    assert_eq!(pages_requested(&fake), [1, 2, 3, 4]);
    assert!(fake.page_calls().iter().all(|(slug, _, per_page)| slug == "produce" && *per_page == 5));
}

#[tokio::test]
async fn test_empty_page_ends_collection() {
    let fake = Arc::new(FakeCatalog::with_page_sizes("produce", &[5, 5, 0, 5]));
    let products = service(&fake, PaginationSettings::default())
        .get_by_slug(86, "produce", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(products.len(), 10);
    assert_eq!(pages_requested(&fake), [1, 2, 3]);
}

#[tokio::test]
async fn test_page_budget_is_not_an_error() {
    let fake = Arc::new(FakeCatalog::with_page_sizes("produce", &[5, 5, 5, 5]));
    let settings = PaginationSettings::new(5, 10, 2, 1000);
    let products = service(&fake, settings)
        .get_by_slug(86, "produce", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(products.len(), 10);
    assert_eq!(pages_requested(&fake), [1, 2]);
}

#[tokio::test]
async fn test_per_page_is_clamped_to_five() {
    let fake = Arc::new(FakeCatalog::with_page_sizes("produce", &[3]));
    let settings = PaginationSettings::new(50, 10, 500, 1000);
    assert_eq!(settings.per_page, 5);

    service(&fake, settings)
        .get_by_slug(86, "produce", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(fake.page_calls()[0].2, 5);
}

#[tokio::test]
async fn test_leaf_filter_keeps_only_matching_entries() {
    let fake = Arc::new(FakeCatalog::with_pages(
        "produce",
        vec![
            vec![
                tagged_product("Gala", "a"),
                tagged_product("Conference", "b"),
                tagged_product("Fuji", "a"),
                raw_product("Untagged"),
                tagged_product("Bosc", "b"),
            ],
            vec![tagged_product("Jonagold", "a")],
        ],
    ));

    let products = service(&fake, PaginationSettings::default())
        .get_by_department_slug(86, "produce", Some("a"), &CancellationToken::new())
        .await
        .unwrap();

    let names: Vec<&str> = products.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["Gala", "Fuji", "Jonagold"]);
    assert_eq!(products[0].url, "https://shop.test/products/gala");
    assert_eq!(products[0].price, "100");
}

#[tokio::test]
async fn test_safety_limit_aborts_fetch() {
    let fake = Arc::new(FakeCatalog::with_page_sizes("produce", &[5, 5, 5]));
    let settings = PaginationSettings::new(5, 10, 500, 7);

    let err = service(&fake, settings)
        .get_by_slug(86, "produce", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, CatalogError::SafetyLimit { limit: 7 }));
    assert_eq!(pages_requested(&fake), [1, 2]);
}

#[tokio::test]
async fn test_page_failure_names_slug_and_page() {
    let mut fake = FakeCatalog::with_page_sizes("produce", &[5, 5, 5]);
    fake.failing_page = Some(2);
    let fake = Arc::new(fake);

    let err = service(&fake, PaginationSettings::default())
        .get_by_slug(86, "produce", &CancellationToken::new())
        .await
        .unwrap_err();

    match &err {
        CatalogError::Page { slug, page, .. } => {
            assert_eq!(slug, "produce");
            assert_eq!(*page, 2);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.upstream_status(), Some(500));
}

#[tokio::test]
async fn test_cancelled_before_first_page() {
    let fake = Arc::new(FakeCatalog::with_page_sizes("produce", &[5]));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = service(&fake, PaginationSettings::default())
        .get_by_slug(86, "produce", &cancel)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert!(fake.page_calls().is_empty());
}

#[tokio::test]
async fn test_invalid_inputs_are_rejected() {
    let fake = Arc::new(FakeCatalog::default());
    let service = service(&fake, PaginationSettings::default());
    let cancel = CancellationToken::new();

    assert!(matches!(
        service.get_by_slug(0, "produce", &cancel).await,
        Err(CatalogError::InvalidArgument(_))
    ));
    assert!(matches!(
        service.get_by_slug(86, "", &cancel).await,
        Err(CatalogError::InvalidArgument(_))
    ));
    assert!(matches!(
        service.get_by_category_id(86, 0, &cancel).await,
        Err(CatalogError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn test_category_id_resolves_to_department_and_leaf() {
    let mut fake = FakeCatalog::with_pages(
        "produce",
        vec![vec![tagged_product("Gala", "apples"), tagged_product("Bosc", "pears")]],
    );
    fake.categories = produce_tree();
    let fake = Arc::new(fake);
    let service = service(&fake, PaginationSettings::default());
    let cancel = CancellationToken::new();

    let (products, slug) = service.get_by_category_id(86, 12345, &cancel).await.unwrap();
    assert_eq!(slug, "apples");
    assert_eq!(products.len(), 1);
    assert_eq!(fake.page_calls()[0].0, "produce");

    let (products, slug) = service.get_by_category_id(86, 100, &cancel).await.unwrap();
    assert_eq!(slug, "produce");
    assert_eq!(products.len(), 2);

    let err = service.get_by_category_id(86, 999, &cancel).await.unwrap_err();
    assert!(err.is_unresolved_category());
}
