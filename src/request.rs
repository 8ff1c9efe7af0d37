//! The purchase request as the pipeline sees it.
//!
//! Requests arrive in whatever shape the transport produced: an API-gateway
//! body, a queue payload, a hand-written JSON file. [`PurchaseRequest::from_value`]
//! is the one place that shape is interpreted; everything downstream reads
//! plain `Option` fields.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// An incoming purchase request.
///
/// Every field is optional at this level. [`crate::generate::PurchaseOrderPipeline::run`]
/// decides which ones are required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    /// Opaque identifier, already stringified.
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Numbers as given, numeric strings coerced, other text kept verbatim.
    pub amount: Option<Value>,
    /// Public URL of the vendor proforma invoice in object storage.
    pub proforma_url: Option<String>,
}

impl PurchaseRequest {
    /// Read a request out of an arbitrary JSON value.
    ///
    /// Never fails: a non-object value or a field of the wrong type simply
    /// yields `None` for that field. The proforma link is read from
    /// `proforma` first and `proforma_url` second.
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };

        let text = |key: &str| -> Option<String> {
            match obj.get(key)? {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                Value::Bool(b) => Some(b.to_string()),
                _ => None,
            }
        };

        let proforma_url = ["proforma", "proforma_url"]
            .iter()
            .filter_map(|key| obj.get(*key).and_then(Value::as_str))
            .map(str::trim)
            .find(|s| !s.is_empty())
            .map(str::to_string);

        Self {
            id: text("id").filter(|s| !s.is_empty()),
            title: text("title"),
            description: text("description"),
            amount: obj.get("amount").and_then(coerce_amount),
            proforma_url,
        }
    }

    /// Shorthand constructor used by tests and the CLI.
    pub fn new(id: impl Into<String>, proforma_url: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            proforma_url: Some(proforma_url.into()),
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_amount(mut self, amount: impl Into<Value>) -> Self {
        self.amount = Some(amount.into());
        self
    }
}

/// Numeric strings become numbers; any other non-empty text passes through.
fn coerce_amount(value: &Value) -> Option<Value> {
    match value {
        Value::Number(n) => Some(Value::Number(n.clone())),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                None
            } else if let Ok(i) = s.parse::<i64>() {
                Some(Value::from(i))
            } else if let Some(n) = s.parse::<f64>().ok().and_then(Number::from_f64) {
                Some(Value::Number(n))
            } else {
                Some(Value::String(s.to_string()))
            }
        }
        _ => None,
    }
}
