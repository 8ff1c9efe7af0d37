//! Configuration types for the purchase-order pipeline.
//!
//! Pipeline behaviour is controlled through [`PipelineConfig`], built via its
//! [`PipelineConfigBuilder`]. Connection settings for the concrete adapters
//! live next to them: [`crate::pipeline::storage::SupabaseConfig`] and
//! [`crate::pipeline::publish::AmqpConfig`].

use crate::error::PurchaseOrderError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Bucket holding both proformas and generated purchase orders.
pub const DEFAULT_BUCKET: &str = "purchase_orders";

/// Queue receiving one completion message per generated purchase order.
pub const DEFAULT_QUEUE: &str = "purchase_orders_queue";

/// Model used when neither config nor environment names one.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Configuration for a [`crate::generate::PurchaseOrderPipeline`].
///
/// # Example
/// ```rust
/// use purchase_order_pipeline::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .bucket("purchase_orders")
///     .queue_name("purchase_orders_queue")
///     .model("gpt-4o-mini")
///     .build()
///     .unwrap();
/// assert!(config.upsert);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Storage bucket for proformas and output PDFs. Default: `purchase_orders`.
    pub bucket: String,

    /// Durable queue receiving completion messages. Default: `purchase_orders_queue`.
    pub queue_name: String,

    /// LLM model identifier. If None, uses [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Maximum tokens the model may generate for the purchase-order JSON. Default: 1024.
    pub max_tokens: usize,

    /// Overwrite an existing `purchase_order_{id}.pdf` on upload. Default: true.
    ///
    /// With upsert on, re-running a request replaces the previous PDF at the
    /// same path instead of failing on the conflict.
    pub upsert: bool,

    /// Optional stage-progress observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            bucket: DEFAULT_BUCKET.to_string(),
            queue_name: DEFAULT_QUEUE.to_string(),
            model: None,
            provider_name: None,
            provider: None,
            max_tokens: 1024,
            upsert: true,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("bucket", &self.bucket)
            .field("queue_name", &self.queue_name)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("max_tokens", &self.max_tokens)
            .field("upsert", &self.upsert)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn PipelineProgressCallback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// Model to request, falling back to [`DEFAULT_MODEL`].
    pub fn model_or_default(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

/// Builder for [`PipelineConfig`].
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.config.bucket = bucket.into();
        self
    }

    pub fn queue_name(mut self, queue: impl Into<String>) -> Self {
        self.config.queue_name = queue.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n.max(1);
        self
    }

    pub fn upsert(mut self, v: bool) -> Self {
        self.config.upsert = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, PurchaseOrderError> {
        let c = &self.config;
        if c.bucket.trim().is_empty() {
            return Err(PurchaseOrderError::InvalidConfig(
                "Bucket name must not be empty".into(),
            ));
        }
        if c.queue_name.trim().is_empty() {
            return Err(PurchaseOrderError::InvalidConfig(
                "Queue name must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Read a required environment variable.
pub(crate) fn required_env(key: &str) -> Result<String, PurchaseOrderError> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(PurchaseOrderError::InvalidConfig(format!(
            "Required environment variable '{key}' is not set"
        ))),
    }
}
