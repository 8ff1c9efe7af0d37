//! Structured-data synthesis: prompt the model once, parse, or fall back.
//!
//! The model call is intentionally thin. Prompt wording lives in
//! [`crate::prompts`], response cleanup in [`super::postprocess`]. This module
//! owns the call itself, the provider resolution chain, and the deterministic
//! fallback record the orchestrator uses whenever synthesis fails.
//!
//! There is no retry: one attempt, then the fallback.

use crate::config::PipelineConfig;
use crate::error::{PurchaseOrderError, SynthesisError};
use crate::output::{LineItem, PurchaseOrderRecord, NOT_AVAILABLE};
use crate::pipeline::postprocess::parse_record;
use crate::prompts::purchase_order_prompt;
use crate::request::PurchaseRequest;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Sampling temperature for synthesis. Pinned so the same proforma yields
/// the same purchase order.
pub const SYNTHESIS_TEMPERATURE: f32 = 0.0;

pub const FALLBACK_DESCRIPTION: &str = "Purchase order generated without detailed description.";
pub const FALLBACK_VENDOR_NAME: &str = "OfficeSupplies Co.";
pub const FALLBACK_VENDOR_ADDRESS: &str = "123 Main Street, Kigali, Rwanda";
pub const FALLBACK_TOTAL: i64 = 5015;

/// The model seam: a single-turn prompt in, raw text out.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String, SynthesisError>;
}

/// [`CompletionClient`] backed by an `edgequake-llm` provider.
pub struct LlmCompletionClient {
    provider: Arc<dyn LLMProvider>,
}

impl LlmCompletionClient {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl CompletionClient for LlmCompletionClient {
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String, SynthesisError> {
        let messages = vec![ChatMessage::user(prompt)];
        let start = Instant::now();
        let response = self
            .provider
            .chat(&messages, Some(options))
            .await
            .map_err(|e| SynthesisError::ModelCall(e.to_string()))?;

        debug!(
            "Synthesis: {} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );
        Ok(response.content)
    }
}

/// Produces purchase-order records from a request and its proforma text.
pub struct Synthesizer {
    client: Arc<dyn CompletionClient>,
    max_tokens: usize,
}

impl Synthesizer {
    pub fn new(client: Arc<dyn CompletionClient>, max_tokens: usize) -> Self {
        Self { client, max_tokens }
    }

    /// Ask the model for a purchase order.
    ///
    /// Any error here is the caller's cue to use [`fallback_record`].
    pub async fn synthesize(
        &self,
        request: &PurchaseRequest,
        proforma_text: &str,
        date_created: &str,
    ) -> Result<PurchaseOrderRecord, SynthesisError> {
        let prompt = purchase_order_prompt(request, proforma_text);
        let raw = self.client.complete(&prompt, &self.options()).await?;
        debug!("Synthesis response: {} chars", raw.len());
        parse_record(&raw, date_created)
    }

    fn options(&self) -> CompletionOptions {
        build_options(self.max_tokens)
    }
}

/// Build `CompletionOptions` for the synthesis call.
fn build_options(max_tokens: usize) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(SYNTHESIS_TEMPERATURE),
        max_tokens: Some(max_tokens),
        ..Default::default()
    }
}

/// The record used whenever synthesis fails.
///
/// Built only from the request's own title, description and amount plus fixed
/// placeholder vendor data and a fixed three-line catalog. Total for any
/// input.
pub fn fallback_record(request: &PurchaseRequest, date_created: &str) -> PurchaseOrderRecord {
    PurchaseOrderRecord {
        title: request
            .title
            .clone()
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        description: request
            .description
            .clone()
            .unwrap_or_else(|| FALLBACK_DESCRIPTION.to_string()),
        amount: request.amount.clone().unwrap_or_else(|| Value::from(0)),
        vendor_name: FALLBACK_VENDOR_NAME.to_string(),
        vendor_address: FALLBACK_VENDOR_ADDRESS.to_string(),
        date_created: date_created.to_string(),
        items: vec![
            LineItem::new("Ergonomic Chair Model X", 10, 250),
            LineItem::new("Office Desk Model D", 5, 400),
            LineItem::new("Desk Lamp Model L", 8, 50),
        ],
        total: Some(Value::from(FALLBACK_TOTAL)),
    }
}

/// Instantiate a named provider with the given model.
fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, PurchaseOrderError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        PurchaseOrderError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`).
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **OpenAI key** (`OPENAI_API_KEY`) with the configured or default model.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_provider(config: &PipelineConfig) -> Result<Arc<dyn LLMProvider>, PurchaseOrderError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        return create_provider(name, config.model_or_default());
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_provider("openai", config.model_or_default());
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| PurchaseOrderError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
