//! Prompts for purchase-order synthesis.
//!
//! Every prompt lives here so the wording can change without touching the
//! call or parsing logic in [`crate::pipeline::llm`], and so tests can inspect
//! the exact text sent to the model.

use crate::output::{display_value, NOT_AVAILABLE};
use crate::request::PurchaseRequest;

/// Field list the model must return, in prompt order.
pub const RESPONSE_FIELDS: [&str; 7] = [
    "title",
    "description",
    "amount",
    "vendor_name",
    "vendor_address",
    "items",
    "total",
];

/// Build the single-turn prompt for one purchase request.
pub fn purchase_order_prompt(request: &PurchaseRequest, proforma_text: &str) -> String {
    let field = |v: Option<&str>| v.unwrap_or(NOT_AVAILABLE).to_string();
    let amount = request
        .amount
        .as_ref()
        .map(display_value)
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());

    format!(
        r#"You extract structured Purchase Order data from a purchase request and the vendor's proforma invoice.

Purchase Request:
- ID: {id}
- Title: {title}
- Description: {description}
- Amount: {amount}

Proforma Invoice Text:
"""
{proforma_text}
"""

Return ONLY a JSON object with exactly these fields:
{fields}

Do not add commentary. Do not wrap the JSON in code fences. The JSON must be valid and parsable."#,
        id = field(request.id.as_deref()),
        title = field(request.title.as_deref()),
        description = field(request.description.as_deref()),
        fields = response_field_list(),
    )
}

fn response_field_list() -> String {
    RESPONSE_FIELDS
        .iter()
        .map(|name| match *name {
            "items" => "- items (array of objects with name, quantity, unit_price)".to_string(),
            other => format!("- {other}"),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
