//! Records produced by the pipeline.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Placeholder shown wherever a value is missing.
pub const NOT_AVAILABLE: &str = "N/A";

/// A structured purchase order, ready for rendering.
///
/// Always fully populated: either every field came from synthesis (with
/// `"N/A"` filled in for anything the model left out) or the whole record is
/// the fallback template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrderRecord {
    pub title: String,
    pub description: String,
    /// Loosely typed: the model may answer with a number or a string.
    pub amount: Value,
    pub vendor_name: String,
    pub vendor_address: String,
    /// ISO date, `YYYY-MM-DD`.
    pub date_created: String,
    pub items: Vec<LineItem>,
    /// `None` when the model reported no total; the renderer then omits the
    /// total line.
    pub total: Option<Value>,
}

/// One row of the purchase order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub quantity: Value,
    pub unit_price: Value,
}

impl LineItem {
    pub fn new(name: impl Into<String>, quantity: impl Into<Value>, unit_price: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            quantity: quantity.into(),
            unit_price: unit_price.into(),
        }
    }

    /// `quantity * unit_price`, or `None` if either side is not numeric.
    pub fn line_total(&self) -> Option<f64> {
        Some(coerce_f64(&self.quantity)? * coerce_f64(&self.unit_price)?)
    }
}

/// The outcome of one successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub purchase_order: PurchaseOrderRecord,
    /// Storage-relative path as reported by the object store.
    pub pdf_path: String,
    pub pdf_url: String,
}

/// Completion event published to the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMessage {
    pub purchase_order_id: String,
    pub pdf_url: String,
}

impl QueueMessage {
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Coerce a JSON value to a float: numbers directly, strings by parsing.
pub fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// Render a JSON value the way it should read on the page: strings without
/// quotes, `null` as `"N/A"`, everything else as JSON text.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => NOT_AVAILABLE.to_string(),
        other => other.to_string(),
    }
}
