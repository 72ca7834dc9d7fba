//! Raw record transformation
//!
//! Maps one upstream product object into the flat [`ProductRecord`] row.
//! Missing or null nested objects fall back to empty/false defaults rather
//! than failing; the API omits fields freely.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Storefront base for product links.
pub const PRODUCT_BASE_URL: &str = "https://birmarket.az/products";

/// Output columns, in order.
pub const CSV_FIELDS: [&str; 18] = [
    "id",
    "name",
    "brand",
    "category_id",
    "category_name",
    "status",
    "retail_price",
    "old_price",
    "discount_pct",
    "seller_name",
    "seller_rating",
    "rating_value",
    "review_count",
    "in_stock",
    "installment_enabled",
    "max_installment_months",
    "image_url",
    "product_url",
];

/// One catalog product in output form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Product identifier
    pub id: Option<String>,
    /// Display name
    pub name: Option<String>,
    /// Brand, empty when unbranded
    #[serde(default)]
    pub brand: String,
    /// Leaf category identifier
    pub category_id: Option<String>,
    /// Leaf category name
    #[serde(default)]
    pub category_name: String,
    /// Listing status
    pub status: Option<String>,
    /// Current price
    pub retail_price: Option<f64>,
    /// Pre-discount price
    pub old_price: Option<f64>,
    /// Discount off the old price, one decimal
    #[serde(default)]
    pub discount_pct: f64,
    /// Marketing name of the default offer's seller
    #[serde(default)]
    pub seller_name: String,
    /// Seller rating
    pub seller_rating: Option<f64>,
    /// Average product rating
    pub rating_value: Option<f64>,
    /// Number of reviews
    pub review_count: Option<u64>,
    /// Default offer is available
    #[serde(default)]
    pub in_stock: bool,
    /// Installment purchase offered
    #[serde(default)]
    pub installment_enabled: bool,
    /// Longest installment term
    pub max_installment_months: Option<u32>,
    /// Medium-size main image
    #[serde(default)]
    pub image_url: String,
    /// Storefront link derived from the slug
    #[serde(default)]
    pub product_url: String,
}

impl ProductRecord {
    /// Build a row from a raw API product.
    pub fn from_raw(raw: &Value) -> Self {
        let retail_price = offer(raw, "retail_price").and_then(number);
        let old_price = offer(raw, "old_price").and_then(number);
        let slug = raw
            .get("slugged_name")
            .and_then(scalar)
            .unwrap_or_default();

        Self {
            id: raw.get("id").and_then(scalar),
            name: raw.get("name").and_then(scalar),
            brand: raw.get("brand").and_then(scalar).unwrap_or_default(),
            category_id: raw.get("category_id").and_then(scalar),
            category_name: text_at(raw, "/category/name"),
            status: raw.get("status").and_then(scalar),
            retail_price,
            old_price,
            discount_pct: discount_pct(retail_price, old_price),
            seller_name: text_at(raw, "/default_offer/seller/marketing_name/name"),
            seller_rating: raw
                .pointer("/default_offer/seller/rating")
                .and_then(number),
            rating_value: raw.pointer("/ratings/rating_value").and_then(number),
            review_count: raw.pointer("/ratings/session_count").and_then(Value::as_u64),
            in_stock: offer(raw, "avail_check").is_some_and(truthy),
            installment_enabled: offer(raw, "installment_enabled").is_some_and(truthy),
            max_installment_months: offer(raw, "max_installment_months")
                .and_then(Value::as_u64)
                .and_then(|m| u32::try_from(m).ok()),
            image_url: text_at(raw, "/main_img/medium"),
            product_url: format!("{PRODUCT_BASE_URL}/{slug}"),
        }
    }
}

/// Percentage saved against the old price, rounded to one decimal.
///
/// Zero unless both prices are present and non-zero and the old price is
/// strictly higher.
pub fn discount_pct(retail: Option<f64>, old: Option<f64>) -> f64 {
    match (retail, old) {
        (Some(retail), Some(old)) if retail != 0.0 && old != 0.0 && old > retail => {
            ((1.0 - retail / old) * 1000.0).round() / 10.0
        }
        _ => 0.0,
    }
}

fn offer<'a>(raw: &'a Value, key: &str) -> Option<&'a Value> {
    raw.get("default_offer").and_then(|o| o.get(key))
}

fn text_at(raw: &Value, pointer: &str) -> String {
    raw.pointer(pointer).and_then(scalar).unwrap_or_default()
}

/// Strings pass through, numbers and booleans are rendered; null and
/// containers are absent.
fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Null => false,
    }
}
