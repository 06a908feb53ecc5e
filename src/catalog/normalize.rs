//! Raw product → [`Product`]
//!
//! Field extraction is heuristic: several candidate keys are tried in a
//! fixed order and the first usable value wins.

use serde_json::Value;

use super::shapes::RawProduct;
use crate::Product;

/// Extract name, price and URL from a raw entry. Relative permalinks are
/// joined to `base_url`.
pub fn normalize(base_url: &str, raw: &RawProduct) -> Product {
    Product {
        name: extract_name(raw),
        price: extract_price(raw),
        url: extract_url(base_url, raw),
    }
}

fn extract_name(raw: &RawProduct) -> String {
    ["name", "title"]
        .iter()
        .filter_map(|key| raw.str_field(key))
        .find(|s| !s.is_empty())
        .unwrap_or_default()
        .to_string()
}

fn extract_url(base_url: &str, raw: &RawProduct) -> String {
    for key in ["canonical_url", "url"] {
        if let Some(url) = raw.str_field(key).filter(|u| u.starts_with("http")) {
            return url.to_string();
        }
    }

    match raw.str_field("permalink") {
        Some(link) if link.starts_with("http") => link.to_string(),
        Some(link) if link.starts_with('/') => format!("{}{}", base_url.trim_end_matches('/'), link),
        Some(link) if !link.is_empty() => format!("{}/{}", base_url.trim_end_matches('/'), link),
        _ => String::new(),
    }
}

fn extract_price(raw: &RawProduct) -> String {
    let fields = &raw.fields;

    if let Some(price) = fields.get("price").and_then(number_string) {
        return normalize_price(&price);
    }

    let first_offer = fields
        .get("offers")
        .and_then(Value::as_array)
        .and_then(|offers| offers.first())
        .and_then(Value::as_object);
    if let Some(offer) = first_offer {
        if let Some(price) = offer.get("price").and_then(number_string) {
            return normalize_price(&price);
        }
        if let Some(price) = offer.get("price").and_then(Value::as_object) {
            let amount = ["amount", "value"]
                .iter()
                .find_map(|key| price.get(*key).and_then(number_string));
            if let Some(amount) = amount {
                return normalize_price(&amount);
            }
        }
    }

    ["current_price", "price_current"]
        .iter()
        .find_map(|key| fields.get(*key).and_then(number_string))
        .map(|price| normalize_price(&price))
        .unwrap_or_default()
}

/// Render a JSON number or non-empty string as text. Integral numbers have
/// no fractional part.
fn number_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Some(u.to_string())
            } else {
                let f = n.as_f64()?;
                if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                    Some((f as i64).to_string())
                } else {
                    Some(f.to_string())
                }
            }
        }
        _ => None,
    }
}

/// Strip currency markers and spacing, use `.` as the decimal separator.
///
/// `"1 299,90 ₽"` becomes `"1299.90"`.
pub fn normalize_price(raw: &str) -> String {
    raw.trim()
        .replace('\u{00A0}', " ")
        .replace('₽', "")
        .replace("руб.", "")
        .replace("руб", "")
        .trim()
        .replace(' ', "")
        .replace(',', ".")
}
