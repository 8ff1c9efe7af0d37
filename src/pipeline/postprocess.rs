//! Post-processing: turn the raw model answer into a [`PurchaseOrderRecord`].
//!
//! Even when told to answer with bare JSON, models regularly wrap it in
//! ```` ```json ```` fences or leave fields out. Two steps, applied in order:
//!
//! 1. Strip outer code fences.
//! 2. Parse as a JSON object and fill every missing field with a placeholder,
//!    so the record is always complete.

use crate::error::SynthesisError;
use crate::output::{LineItem, PurchaseOrderRecord, NOT_AVAILABLE};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

/// Parse a raw model answer into a record dated `date_created`.
pub fn parse_record(raw: &str, date_created: &str) -> Result<PurchaseOrderRecord, SynthesisError> {
    let content = strip_code_fences(raw);
    let value: Value = serde_json::from_str(&content).map_err(|e| SynthesisError::Parse {
        detail: e.to_string(),
        content: content.clone(),
    })?;

    let Value::Object(obj) = value else {
        return Err(SynthesisError::Parse {
            detail: "expected a JSON object".to_string(),
            content,
        });
    };

    Ok(record_from_object(&obj, date_created))
}

// ── Rule 1: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*[ \t]*\n?(.*?)\s*```$").unwrap());

pub fn strip_code_fences(input: &str) -> String {
    let trimmed = input.trim();
    if let Some(caps) = RE_OUTER_FENCES.captures(trimmed) {
        caps[1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

// ── Rule 2: Fill the record ──────────────────────────────────────────────────

fn record_from_object(obj: &Map<String, Value>, date_created: &str) -> PurchaseOrderRecord {
    let items = match obj.get("items") {
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(idx, item)| line_item(item, idx + 1))
            .collect(),
        _ => Vec::new(),
    };

    PurchaseOrderRecord {
        title: text_field(obj, "title"),
        description: text_field(obj, "description"),
        amount: value_field(obj, "amount"),
        vendor_name: text_field(obj, "vendor_name"),
        vendor_address: text_field(obj, "vendor_address"),
        date_created: match obj.get("date_created") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
            _ => date_created.to_string(),
        },
        items,
        total: obj.get("total").filter(|v| !v.is_null()).cloned(),
    }
}

fn line_item(item: &Value, position: usize) -> LineItem {
    let get = |key: &str| item.get(key).filter(|v| !v.is_null());
    let name = match get("name") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => format!("Item {position}"),
    };
    LineItem {
        name,
        quantity: get("quantity").cloned().unwrap_or_else(not_available),
        unit_price: get("unit_price").cloned().unwrap_or_else(not_available),
    }
}

fn text_field(obj: &Map<String, Value>, key: &str) -> String {
    match obj.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => NOT_AVAILABLE.to_string(),
        Some(other) => other.to_string(),
    }
}

fn value_field(obj: &Map<String, Value>, key: &str) -> Value {
    obj.get(key)
        .filter(|v| !v.is_null())
        .cloned()
        .unwrap_or_else(not_available)
}

fn not_available() -> Value {
    Value::String(NOT_AVAILABLE.to_string())
}

// ── Tests ────────────────────────────────────────────────────────────────────
