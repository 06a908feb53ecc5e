//! Category id → department / leaf slug
//!
//! Only departments (branch nodes) are addressable upstream. A leaf is
//! served by listing its nearest department ancestor and filtering the
//! entries tagged with the leaf's slug.

use tracing::warn;

use super::{CatalogError, CatalogResult};
use crate::Category;

/// What to request for a category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepartmentTarget {
    /// Department slug passed to the listing endpoint
    pub department_slug: String,
    /// Leaf slug entries are filtered by; `None` lists the whole department
    pub leaf_slug: Option<String>,
}

impl DepartmentTarget {
    /// Slug that identifies the result: the leaf when filtering, otherwise
    /// the department.
    pub fn used_slug(&self) -> &str {
        self.leaf_slug.as_deref().unwrap_or(&self.department_slug)
    }
}

/// Depth-first search for `id`. Returns the nodes from a root down to the
/// match, inclusive.
pub fn find_path(categories: &[Category], id: i64) -> Option<Vec<&Category>> {
    for category in categories {
        if category.id == id {
            return Some(vec![category]);
        }
        if !category.children.is_empty() {
            if let Some(mut path) = find_path(&category.children, id) {
                path.insert(0, category);
                return Some(path);
            }
        }
    }
    None
}

/// Decide which department to list for `category_id` and which leaf slug
/// to filter by.
///
/// A leaf without any department ancestor is listed as if it were a
/// department itself. Upstream may return nothing for it.
pub fn resolve_target(
    categories: &[Category],
    store_id: i64,
    category_id: i64,
) -> CatalogResult<DepartmentTarget> {
    let path = find_path(categories, category_id).ok_or(CatalogError::CategoryNotFound {
        store_id,
        category_id,
    })?;

    let Some((target, ancestors)) = path.split_last() else {
        return Err(CatalogError::CategoryNotFound { store_id, category_id });
    };

    if target.slug.is_empty() {
        return Err(CatalogError::EmptySlug { category_id });
    }

    if target.is_department() {
        return Ok(DepartmentTarget {
            department_slug: target.slug.clone(),
            leaf_slug: None,
        });
    }

    let department = ancestors
        .iter()
        .rev()
        .find(|c| c.is_department() && !c.slug.is_empty());

    match department {
        Some(department) => Ok(DepartmentTarget {
            department_slug: department.slug.clone(),
            leaf_slug: Some(target.slug.clone()),
        }),
        None => {
            warn!(
                store_id,
                category_id,
                slug = %target.slug,
                "No department ancestor for leaf category, listing the leaf slug directly"
            );
            Ok(DepartmentTarget {
                department_slug: target.slug.clone(),
                leaf_slug: None,
            })
        }
    }
}
