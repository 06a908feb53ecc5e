//! Request handlers

use actix_web::{web, HttpResponse};
use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;

use super::{AppState, ServerError};
use crate::cancel::{cancel_after, CancellationToken, DropGuard};
use crate::output::{timestamp_now, CategoryMeta, CategoryResult, StoreMeta};
use crate::Category;

type Query = web::Query<HashMap<String, String>>;

/// Flattened category row
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FlatCategory {
    /// Category identifier
    pub id: i64,
    /// Parent identifier
    pub parent_id: i64,
    /// Display name
    pub name: String,
    /// Slug
    pub slug: String,
    /// Product count reported upstream
    pub products_count: i64,
    /// Branch flag
    pub has_children: bool,
    /// Depth in the tree, roots are 0
    pub level: usize,
}

#[derive(Serialize)]
struct CategoriesResponse {
    store_id: i64,
    fetched_at: String,
    count: usize,
    categories: Vec<FlatCategory>,
}

/// Depth-first flattening of the category tree.
///
/// With `hide_root_leaves`, root-level nodes that are not flagged as having
/// children are left out (they cannot be listed); any children they carry
/// are still included.
pub fn flatten_categories(categories: &[Category], hide_root_leaves: bool) -> Vec<FlatCategory> {
    let mut out = Vec::with_capacity(256);
    flatten_into(categories, 0, hide_root_leaves, &mut out);
    out
}

fn flatten_into(categories: &[Category], level: usize, hide_root_leaves: bool, out: &mut Vec<FlatCategory>) {
    for c in categories {
        let hidden = hide_root_leaves && c.parent_id == 0 && !c.has_children;
        if !hidden {
            out.push(FlatCategory {
                id: c.id,
                parent_id: c.parent_id,
                name: c.name.clone(),
                slug: c.slug.clone(),
                products_count: c.products_count,
                has_children: c.has_children,
                level,
            });
        }
        flatten_into(&c.children, level + 1, hide_root_leaves, out);
    }
}

/// Integer query parameter under any of `keys`; the first present key wins.
fn query_int(query: &HashMap<String, String>, keys: &[&str]) -> Result<Option<i64>, ServerError> {
    for key in keys {
        match query.get(*key).map(|v| v.trim()) {
            Some("") | None => continue,
            Some(raw) => {
                return raw
                    .parse::<i64>()
                    .map(Some)
                    .map_err(|_| ServerError::BadRequest(format!("{key} must be integer")));
            }
        }
    }
    Ok(None)
}

fn store_id(state: &AppState, query: &HashMap<String, String>) -> Result<i64, ServerError> {
    let id = query_int(query, &["storeID", "storeid"])?.unwrap_or(state.default_store_id);
    if id <= 0 {
        return Err(ServerError::BadRequest("storeID must be > 0".to_string()));
    }
    Ok(id)
}

/// Token for one request, cancelled at the deadline or when the returned
/// guard drops (handler finished or client went away).
fn request_token(state: &AppState) -> (CancellationToken, DropGuard) {
    let token = CancellationToken::new();
    cancel_after(&token, state.timeout);
    let guard = token.clone().drop_guard();
    (token, guard)
}

/// `GET /health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"status": "ok"}))
}

/// `GET /categories?storeID=`
pub async fn categories(state: web::Data<AppState>, query: Query) -> Result<HttpResponse, ServerError> {
    let store_id = store_id(&state, &query)?;

    let (cancel, _guard) = request_token(&state);
    let tree = state
        .api
        .list_categories(store_id, &cancel)
        .await
        .map_err(|e| {
            warn!(store_id, error = %e, "List categories failed");
            ServerError::from(e)
        })?;

    let categories = flatten_categories(&tree, true);
    Ok(HttpResponse::Ok().json(CategoriesResponse {
        store_id,
        fetched_at: timestamp_now(),
        count: categories.len(),
        categories,
    }))
}

/// `GET /products?storeID=&categoryID=`
pub async fn products(state: web::Data<AppState>, query: Query) -> Result<HttpResponse, ServerError> {
    let store_id = store_id(&state, &query)?;
    let category_id = query_int(&query, &["categoryID", "categoryid"])?
        .ok_or_else(|| ServerError::BadRequest("categoryID is required".to_string()))?;
    if category_id <= 0 {
        return Err(ServerError::BadRequest("categoryID must be > 0".to_string()));
    }

    let (cancel, _guard) = request_token(&state);
    let cancel = &cancel;

    let store = match state.api.get_store(store_id, cancel).await {
        Ok(info) => Some(StoreMeta::from(info)),
        Err(e) => {
            warn!(store_id, error = %e, "Store lookup failed, continuing without store info");
            None
        }
    };

    let (products, slug) = state
        .products
        .get_by_category_id(store_id, category_id, cancel)
        .await
        .map_err(|e| {
            warn!(store_id, category_id, error = %e, "Category products failed");
            ServerError::from(e)
        })?;

    Ok(HttpResponse::Ok().json(CategoryResult::new(
        store,
        Some(CategoryMeta {
            id: category_id,
            slug,
        }),
        products,
    )))
}
