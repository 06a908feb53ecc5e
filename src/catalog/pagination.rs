//! Paginated product collection for a category
//!
//! Pages are requested strictly in order. Collection stops on:
//! - an empty page
//! - a page shorter than `per_page` (last page)
//! - reaching `max_pages` (not an error)
//!
//! Accumulating more than `max_products` aborts the fetch with
//! [`CatalogError::SafetyLimit`].

use std::sync::Arc;
use tracing::{debug, info};

use super::normalize::normalize;
use super::resolver::{resolve_target, DepartmentTarget};
use super::{CatalogApi, CatalogError, CatalogResult, PageRequest};
use crate::cancel::{self, CancellationToken};
use crate::metrics::FetchMetrics;
use crate::Product;

/// Upper bound for `per_page`; the upstream rejects larger pages.
pub const MAX_PER_PAGE: u32 = 5;

/// Default offers requested per product
pub const DEFAULT_OFFERS_LIMIT: u32 = 10;

/// Default page budget per department
pub const DEFAULT_MAX_PAGES: u32 = 500;

/// Default ceiling on products collected in one fetch
pub const DEFAULT_MAX_PRODUCTS: usize = 200_000;

/// Page size and safety bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationSettings {
    /// Entries per page, 1..=5
    pub per_page: u32,
    /// Offers per product
    pub offers_limit: u32,
    /// Maximum pages requested per department
    pub max_pages: u32,
    /// Maximum products accumulated before failing
    pub max_products: usize,
}

impl PaginationSettings {
    /// Build settings; zero values select defaults and `per_page` is
    /// clamped to [`MAX_PER_PAGE`].
    pub fn new(per_page: u32, offers_limit: u32, max_pages: u32, max_products: usize) -> Self {
        Self {
            per_page: match per_page {
                0 => MAX_PER_PAGE,
                n => n.min(MAX_PER_PAGE),
            },
            offers_limit: if offers_limit == 0 { DEFAULT_OFFERS_LIMIT } else { offers_limit },
            max_pages: if max_pages == 0 { DEFAULT_MAX_PAGES } else { max_pages },
            max_products: if max_products == 0 { DEFAULT_MAX_PRODUCTS } else { max_products },
        }
    }
}

impl Default for PaginationSettings {
    fn default() -> Self {
        Self::new(MAX_PER_PAGE, DEFAULT_OFFERS_LIMIT, DEFAULT_MAX_PAGES, DEFAULT_MAX_PRODUCTS)
    }
}

/// Category → products use case
pub struct CategoryProductsService {
    api: Arc<dyn CatalogApi>,
    base_url: String,
    settings: PaginationSettings,
}

impl CategoryProductsService {
    /// Create a service. `base_url` is used to absolutize relative product
    /// permalinks.
    pub fn new(api: Arc<dyn CatalogApi>, base_url: impl Into<String>, settings: PaginationSettings) -> Self {
        Self {
            api,
            base_url: base_url.into(),
            settings,
        }
    }

    /// Effective settings
    pub fn settings(&self) -> &PaginationSettings {
        &self.settings
    }

    /// Fetch the store's category tree and decide which department to list
    /// and which leaf to filter by.
    pub async fn resolve_department_and_leaf_slug(
        &self,
        store_id: i64,
        category_id: i64,
        cancel: &CancellationToken,
    ) -> CatalogResult<DepartmentTarget> {
        ensure_positive("storeID", store_id)?;
        ensure_positive("categoryID", category_id)?;

        let categories = self.api.list_categories(store_id, cancel).await?;
        let target = resolve_target(&categories, store_id, category_id)?;
        debug!(
            store_id,
            category_id,
            department_slug = %target.department_slug,
            leaf_slug = target.leaf_slug.as_deref().unwrap_or(""),
            "Resolved category"
        );
        Ok(target)
    }

    /// Products of a category together with the slug actually used (the
    /// leaf slug when filtering, else the department slug).
    pub async fn get_by_category_id(
        &self,
        store_id: i64,
        category_id: i64,
        cancel: &CancellationToken,
    ) -> CatalogResult<(Vec<Product>, String)> {
        let target = self
            .resolve_department_and_leaf_slug(store_id, category_id, cancel)
            .await?;
        let products = self
            .get_by_department_slug(
                store_id,
                &target.department_slug,
                target.leaf_slug.as_deref(),
                cancel,
            )
            .await?;
        Ok((products, target.used_slug().to_string()))
    }

    /// Products of a whole department, unfiltered.
    pub async fn get_by_slug(
        &self,
        store_id: i64,
        slug: &str,
        cancel: &CancellationToken,
    ) -> CatalogResult<Vec<Product>> {
        self.get_by_department_slug(store_id, slug, None, cancel).await
    }

    /// Walk the department's pages, keeping only entries tagged with
    /// `leaf_slug` when one is given.
    pub async fn get_by_department_slug(
        &self,
        store_id: i64,
        department_slug: &str,
        leaf_slug: Option<&str>,
        cancel: &CancellationToken,
    ) -> CatalogResult<Vec<Product>> {
        ensure_positive("storeID", store_id)?;
        if department_slug.is_empty() {
            return Err(CatalogError::InvalidArgument(
                "departmentSlug must not be empty".to_string(),
            ));
        }
        let leaf_slug = leaf_slug.filter(|s| !s.is_empty());
        let settings = self.settings;

        info!(
            store_id,
            department_slug,
            leaf_slug = leaf_slug.unwrap_or(""),
            per_page = settings.per_page,
            offers_limit = settings.offers_limit,
            "Fetching category products"
        );

        let fetch_metrics = FetchMetrics::start(
            "category_products",
            format!("{store_id}/{}", leaf_slug.unwrap_or(department_slug)),
        );
        let result = self
            .collect_pages(store_id, department_slug, leaf_slug, cancel)
            .await;
        match &result {
            Ok(products) => fetch_metrics.record_success(products.len()),
            Err(e) => fetch_metrics.record_failure(&e.to_string()),
        }
        result
    }

    async fn collect_pages(
        &self,
        store_id: i64,
        department_slug: &str,
        leaf_slug: Option<&str>,
        cancel: &CancellationToken,
    ) -> CatalogResult<Vec<Product>> {
        let settings = self.settings;
        let mut products = Vec::with_capacity(128);

        for page in 1..=settings.max_pages {
            cancel::check(cancel)?;

            let request = PageRequest {
                department_slug,
                page,
                per_page: settings.per_page,
                offers_limit: settings.offers_limit,
            };
            let raw = self
                .api
                .list_products(store_id, request, cancel)
                .await
                .map_err(|e| CatalogError::Page {
                    slug: department_slug.to_string(),
                    page,
                    source: Box::new(e),
                })?;

            let raw_len = raw.len();
            if raw_len == 0 {
                debug!(page, "Empty page, stopping");
                break;
            }

            let before = products.len();
            let kept = raw.iter().filter(|entry| match leaf_slug {
                Some(leaf) => entry.department_slug.as_deref() == Some(leaf),
                None => true,
            });
            for entry in kept {
                let product = normalize(&self.base_url, entry);
                if product.is_empty() {
                    continue;
                }
                products.push(product);
                if products.len() > settings.max_products {
                    return Err(CatalogError::SafetyLimit {
                        limit: settings.max_products,
                    });
                }
            }

            debug!(
                page,
                raw = raw_len,
                kept = products.len() - before,
                total = products.len(),
                "Fetched products page"
            );

            if raw_len < settings.per_page as usize {
                break;
            }
        }

        Ok(products)
    }
}

fn ensure_positive(name: &str, value: i64) -> CatalogResult<()> {
    if value <= 0 {
        return Err(CatalogError::InvalidArgument(format!("{name} must be > 0")));
    }
    Ok(())
}
