//! Product listing response shapes
//!
//! The department endpoint answers in one of several layouts. Each layout is
//! a [`ProductShape`]; shapes are tried in [`ProductShape::PRECEDENCE`] order
//! and the first one yielding at least one entry wins.

use serde_json::{Map, Value};

use super::{ApiError, CatalogError, CatalogResult};

/// Raw upstream product entry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawProduct {
    /// Untyped fields as received
    pub fields: Map<String, Value>,
    /// Sub-department the entry was listed under, when the response says so
    pub department_slug: Option<String>,
}

impl RawProduct {
    /// Untagged entry
    pub fn new(fields: Map<String, Value>) -> Self {
        Self {
            fields,
            department_slug: None,
        }
    }

    /// Entry tagged with the department it belongs to
    pub fn tagged(fields: Map<String, Value>, department_slug: impl Into<String>) -> Self {
        Self {
            fields,
            department_slug: Some(department_slug.into()),
        }
    }

    /// String field, if present and a string
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }
}

/// Known layouts of a product listing body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductShape {
    /// `departments[].products[]`; entries are tagged with the department slug
    Departments,
    /// `deals[]`
    Deals,
    /// `products[]`
    Products,
    /// `items[]`
    Items,
    /// `data.products[]`
    DataProducts,
}

impl ProductShape {
    /// Order in which shapes are tried.
    pub const PRECEDENCE: [ProductShape; 5] = [
        ProductShape::Departments,
        ProductShape::Deals,
        ProductShape::Products,
        ProductShape::Items,
        ProductShape::DataProducts,
    ];

    /// Name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            ProductShape::Departments => "departments",
            ProductShape::Deals => "deals",
            ProductShape::Products => "products",
            ProductShape::Items => "items",
            ProductShape::DataProducts => "data.products",
        }
    }

    /// Entries matching this shape; empty when the shape does not apply.
    pub fn extract(&self, body: &Map<String, Value>) -> Vec<RawProduct> {
        match self {
            ProductShape::Departments => {
                let Some(departments) = body.get("departments").and_then(Value::as_array) else {
                    return Vec::new();
                };
                departments
                    .iter()
                    .filter_map(Value::as_object)
                    .flat_map(|department| {
                        let slug = pick_string(department, &["slug", "department_slug", "category_slug"]);
                        let products = department
                            .get("products")
                            .and_then(Value::as_array)
                            .map(Vec::as_slice)
                            .unwrap_or_default();
                        to_raw(products, slug)
                    })
                    .collect()
            }
            ProductShape::Deals => array_at(body, &["deals"]),
            ProductShape::Products => array_at(body, &["products"]),
            ProductShape::Items => array_at(body, &["items"]),
            ProductShape::DataProducts => array_at(body, &["data", "products"]),
        }
    }
}

fn pick_string<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| map.get(*key).and_then(Value::as_str))
        .find(|s| !s.is_empty())
}

fn array_at(body: &Map<String, Value>, path: &[&str]) -> Vec<RawProduct> {
    let mut current = body;
    let (last, parents) = match path.split_last() {
        Some(split) => split,
        None => return Vec::new(),
    };
    for key in parents {
        match current.get(*key).and_then(Value::as_object) {
            Some(next) => current = next,
            None => return Vec::new(),
        }
    }
    match current.get(*last).and_then(Value::as_array) {
        Some(items) => to_raw(items, None),
        None => Vec::new(),
    }
}

fn to_raw(items: &[Value], department_slug: Option<&str>) -> Vec<RawProduct> {
    items
        .iter()
        .filter_map(Value::as_object)
        .map(|fields| RawProduct {
            fields: fields.clone(),
            department_slug: department_slug.map(str::to_string),
        })
        .collect()
}

/// Parse a 200 response body of the department endpoint.
///
/// The body must be a JSON object. When no shape matches but the body
/// carries a `code` field it is reported as an [`ApiError`]; otherwise the
/// page is empty.
pub fn parse_products_page(status: u16, body: &[u8]) -> CatalogResult<Vec<RawProduct>> {
    let value: Value = serde_json::from_slice(body).map_err(|e| {
        let preview = String::from_utf8_lossy(&body[..body.len().min(1024)]);
        CatalogError::Parse(format!("list products: bad json ({e}) body={preview}"))
    })?;

    let Value::Object(map) = value else {
        return Err(CatalogError::Parse(
            "list products: body is not a JSON object".to_string(),
        ));
    };

    for shape in ProductShape::PRECEDENCE {
        let items = shape.extract(&map);
        if !items.is_empty() {
            tracing::trace!(shape = shape.name(), count = items.len(), "Matched product shape");
            return Ok(items);
        }
    }

    if map.contains_key("code") {
        return Err(ApiError {
            status,
            code: map.get("code").cloned(),
            message: map.get("message").and_then(Value::as_str).map(str::to_string),
            body: String::from_utf8_lossy(body).trim().to_string(),
        }
        .into());
    }

    Ok(Vec::new())
}
