//! Function-style invocation: transport event in, status plus body out.
//!
//! Events come in three shapes:
//!
//! - `{"body": "<json string>"}` as sent by an HTTP gateway
//! - `{"body": {...}}` from queue or async triggers
//! - the purchase request itself, for direct invocation
//!
//! Responses follow the gateway convention: `statusCode` plus `body` as a
//! JSON-encoded string.

use crate::error::PurchaseOrderError;
use crate::generate::PurchaseOrderPipeline;
use crate::request::PurchaseRequest;
use serde::{Serialize, Serializer};
use serde_json::{json, Value};
use tracing::{error, info};

pub const SUCCESS_MESSAGE: &str = "Purchase order generated successfully";
pub const INVALID_JSON_MESSAGE: &str = "Invalid JSON in request body";
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error processing purchase order";

/// What the invoker gets back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvocationResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    #[serde(serialize_with = "body_as_json_string")]
    pub body: Value,
}

fn body_as_json_string<S: Serializer>(body: &Value, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&body.to_string())
}

impl InvocationResponse {
    fn success(purchase_order_id: &str, pdf_url: &str) -> Self {
        Self {
            status_code: 200,
            body: json!({
                "message": SUCCESS_MESSAGE,
                "purchase_order_id": purchase_order_id,
                "pdf_url": pdf_url,
            }),
        }
    }

    fn failure(err: &PurchaseOrderError) -> Self {
        let message = match err {
            PurchaseOrderError::InvalidJson { .. } => INVALID_JSON_MESSAGE.to_string(),
            e if e.is_bad_request() => e.to_string(),
            _ => INTERNAL_ERROR_MESSAGE.to_string(),
        };
        Self {
            status_code: err.status_code(),
            body: json!({ "error": message }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

/// Pull the purchase request out of an invocation event.
pub fn request_from_event(event: &Value) -> Result<PurchaseRequest, PurchaseOrderError> {
    match event.get("body") {
        Some(Value::String(body)) => {
            let parsed: Value =
                serde_json::from_str(body).map_err(|e| PurchaseOrderError::InvalidJson {
                    detail: e.to_string(),
                })?;
            Ok(PurchaseRequest::from_value(&parsed))
        }
        Some(body) => Ok(PurchaseRequest::from_value(body)),
        None => Ok(PurchaseRequest::from_value(event)),
    }
}

/// Run the pipeline for one event. Never fails; every error becomes a
/// 400 or 500 response.
pub async fn handle_event(pipeline: &PurchaseOrderPipeline, event: &Value) -> InvocationResponse {
    info!("Invocation received");

    let outcome = match request_from_event(event) {
        Ok(request) => pipeline.run(&request).await.map(|result| (request, result)),
        Err(e) => Err(e),
    };

    match outcome {
        Ok((request, result)) => {
            let id = request.id.as_deref().unwrap_or_default().trim();
            info!("Invocation completed: {}", result.pdf_url);
            InvocationResponse::success(id, &result.pdf_url)
        }
        Err(e) => {
            error!("Invocation failed: {}", e);
            InvocationResponse::failure(&e)
        }
    }
}
