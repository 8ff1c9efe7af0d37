//! Error types for the purchase-order pipeline.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`PurchaseOrderError`] is **fatal**: the run cannot produce a purchase
//!   order (missing input, unreadable proforma, storage or broker failure).
//!   Returned as `Err(PurchaseOrderError)` from
//!   [`crate::generate::PurchaseOrderPipeline::run`].
//!
//! * [`SynthesisError`] is **absorbed**: the generative model failed or
//!   answered with something that is not a JSON object. The pipeline replaces
//!   the record with [`crate::pipeline::llm::fallback_record`] and carries on,
//!   so this type never escapes `run`.

use thiserror::Error;

/// All fatal errors returned by the purchase-order pipeline.
#[derive(Debug, Error)]
pub enum PurchaseOrderError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// A required request field is absent or empty.
    #[error("Missing '{field}' in purchase request")]
    MissingInput { field: &'static str },

    /// The transport delivered a body that is not valid JSON.
    #[error("Invalid JSON in request body: {detail}")]
    InvalidJson { detail: String },

    /// The proforma URL could not be mapped to a storage path.
    #[error("No file path detected in URL: '{url}'")]
    InvalidReference { url: String },

    // ── Document errors ───────────────────────────────────────────────────
    /// The downloaded document does not start with the `%PDF` signature.
    #[error("Only PDF files are supported. First bytes: {magic:?}")]
    UnsupportedFormat { magic: Vec<u8> },

    /// The document has a PDF signature but its structure cannot be parsed.
    #[error("PDF document is corrupt: {detail}")]
    CorruptDocument { detail: String },

    /// Writing the purchase-order PDF failed.
    #[error("Failed to render purchase order PDF: {detail}")]
    Render { detail: String },

    // ── Collaborator errors ───────────────────────────────────────────────
    /// Object storage rejected or failed a download/upload.
    #[error("Storage {operation} failed for '{bucket}/{path}': {reason}")]
    Storage {
        operation: &'static str,
        bucket: String,
        path: String,
        reason: String,
    },

    /// The broker was unreachable or the declare/publish step failed.
    #[error("Failed to publish to queue '{queue}': {reason}")]
    Publish { queue: String, reason: String },

    /// The configured LLM provider could not be initialised.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or environment validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PurchaseOrderError {
    /// `true` when the caller sent a malformed request rather than the
    /// pipeline failing internally.
    pub fn is_bad_request(&self) -> bool {
        matches!(
            self,
            PurchaseOrderError::MissingInput { .. } | PurchaseOrderError::InvalidJson { .. }
        )
    }

    /// HTTP-style status code used by the invocation contract.
    pub fn status_code(&self) -> u16 {
        if self.is_bad_request() {
            400
        } else {
            500
        }
    }

    pub(crate) fn storage(
        operation: &'static str,
        bucket: &str,
        path: &str,
        reason: impl Into<String>,
    ) -> Self {
        PurchaseOrderError::Storage {
            operation,
            bucket: bucket.to_string(),
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn publish(queue: &str, reason: impl std::fmt::Display) -> Self {
        PurchaseOrderError::Publish {
            queue: queue.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Failure of the structured-data synthesis step.
///
/// Never surfaced to callers: the orchestrator matches on it and builds the
/// fallback record instead.
#[derive(Debug, Clone, Error)]
pub enum SynthesisError {
    /// The model client returned an error.
    #[error("LLM call failed: {0}")]
    ModelCall(String),

    /// The response was not a JSON object after fence stripping.
    #[error("Failed to parse LLM response as JSON: {detail}\n{content}")]
    Parse { detail: String, content: String },
}
