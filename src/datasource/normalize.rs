//! Turning backend JSON into typed deals.
//!
//! The backend has shipped several spellings of the same fields over time
//! (`storeId`, `store_id`, a nested `store` object, numbers as strings).
//! All of that is resolved here, once.

use super::{ApiError, SubmitReceipt};
use crate::domain::{Deal, DealId, DealType, Decimal, StoreId};
use serde_json::Value;
use tracing::warn;

/// First present, non-null field among `names`.
fn field<'a>(obj: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| obj.get(*name))
        .find(|v| !v.is_null())
}

fn lenient_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && (i64::MIN as f64..i64::MAX as f64).contains(f))
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_decimal(v: &Value) -> Option<Decimal> {
    match v {
        // Go through the textual form so 19.99 stays 19.99.
        Value::Number(n) => Decimal::from_str_lenient(&n.to_string()).ok(),
        Value::String(s) => Decimal::from_str_lenient(s).ok(),
        _ => None,
    }
}

/// Decimal under the first present name, or 0. A value that is present
/// but unreadable is logged.
fn decimal_field(obj: &Value, names: &[&str], id: DealId) -> Decimal {
    match field(obj, names) {
        None => Decimal::zero(),
        Some(raw) => lenient_decimal(raw).unwrap_or_else(|| {
            warn!("Deal {} has unreadable {} {}, using 0", id, names[0], raw);
            Decimal::zero()
        }),
    }
}

fn lenient_text(v: &Value) -> Option<String> {
    v.as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_id(obj: &Value) -> Option<DealId> {
    field(obj, &["id", "dealId", "deal_id"])
        .and_then(lenient_i64)
        .map(DealId::new)
}

fn parse_store(obj: &Value) -> Option<StoreId> {
    if let Some(id) = field(obj, &["storeId", "store_id"]).and_then(lenient_i64) {
        return Some(StoreId::new(id));
    }
    obj.get("store")
        .and_then(|store| match store {
            Value::Object(_) => field(store, &["id", "storeId", "store_id"]).and_then(lenient_i64),
            other => lenient_i64(other),
        })
        .map(StoreId::new)
}

fn parse_deal_type(obj: &Value) -> Option<DealType> {
    if let Some(id) = field(obj, &["dealTypeId", "deal_type_id"]).and_then(lenient_i64) {
        return DealType::from_wire_id(id);
    }
    let raw = field(obj, &["dealType", "deal_type", "type"])?;
    match raw {
        Value::Number(_) => lenient_i64(raw).and_then(DealType::from_wire_id),
        Value::String(s) => s.parse().ok(),
        Value::Object(_) => {
            if let Some(id) = field(raw, &["id", "dealTypeId"]).and_then(lenient_i64) {
                DealType::from_wire_id(id)
            } else {
                field(raw, &["name"])
                    .and_then(Value::as_str)
                    .and_then(|s| s.parse().ok())
            }
        }
        _ => None,
    }
}

fn parse_steps(obj: &Value) -> Vec<DealId> {
    if let Some(ids) = field(obj, &["dealIds", "deal_ids"]).and_then(Value::as_array) {
        return ids.iter().filter_map(lenient_i64).map(DealId::new).collect();
    }
    field(obj, &["steps"])
        .and_then(Value::as_array)
        .map(|steps| {
            steps
                .iter()
                .filter_map(|step| match step {
                    Value::Object(_) => parse_id(step),
                    other => lenient_i64(other).map(DealId::new),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Normalize a single deal object.
///
/// A missing/invalid id or deal type rejects the element. Price and
/// discount default to 0; discount is clamped to `[0, 100]`.
pub fn parse_deal(obj: &Value) -> Result<Deal, ApiError> {
    if !obj.is_object() {
        return Err(ApiError::Parse("Expected deal object".to_string()));
    }
    let id = parse_id(obj).ok_or_else(|| ApiError::Parse("Missing id field".to_string()))?;
    let deal_type = parse_deal_type(obj)
        .ok_or_else(|| ApiError::Parse(format!("Missing or unknown deal type for deal {}", id)))?;

    let price = decimal_field(obj, &["price", "unitPrice", "unit_price"], id);
    let discount = decimal_field(obj, &["discountPercent", "discount_percent", "discount"], id);

    let mut deal = Deal::new(id, parse_store(obj), deal_type, price, discount)
        .with_steps(parse_steps(obj));
    deal.coupon_code = field(obj, &["couponCode", "coupon_code"]).and_then(lenient_text);
    deal.additional_details =
        field(obj, &["additionalDetails", "additional_details"]).and_then(lenient_text);
    Ok(deal)
}

/// Normalize a candidate page: a bare array or `{ "deals": [...] }`.
///
/// Bad elements are skipped; a body of any other shape yields an empty
/// page.
pub fn parse_page(body: &Value) -> Vec<Deal> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(_) => match body.get("deals").and_then(Value::as_array) {
            Some(items) => items,
            None => {
                warn!("Candidate page has no deals array, treating as empty");
                return Vec::new();
            }
        },
        _ => {
            warn!("Candidate page is neither an array nor an object, treating as empty");
            return Vec::new();
        }
    };

    items
        .iter()
        .filter_map(|item| match parse_deal(item) {
            Ok(deal) => Some(deal),
            Err(e) => {
                warn!("Skipping malformed deal: {}", e);
                None
            }
        })
        .collect()
}

/// Single-deal responses are either the deal itself or `{ "deal": {...} }`.
pub fn parse_single(body: &Value) -> Result<Deal, ApiError> {
    match body.get("deal") {
        Some(inner) if inner.is_object() => parse_deal(inner),
        _ => parse_deal(body),
    }
}

pub fn parse_receipt(body: &Value) -> SubmitReceipt {
    let deal_id = parse_id(body)
        .or_else(|| body.get("deal").and_then(parse_id))
        .or_else(|| body.get("stackedDeal").and_then(parse_id));
    let message = field(body, &["message"]).and_then(lenient_text);
    SubmitReceipt { deal_id, message }
}

/// Pull a human-readable message out of an error body: a JSON
/// `message`/`error`/`detail` string, else the plain text.
pub fn extract_error_message(body: &str) -> String {
    let trimmed = body.trim();
    if let Ok(json) = serde_json::from_str::<Value>(trimmed) {
        if let Some(msg) = field(&json, &["message", "error", "detail"]).and_then(lenient_text) {
            return msg;
        }
        if json.is_object() || json.is_array() {
            return String::new();
        }
    }
    trimmed.to_string()
}
