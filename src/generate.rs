//! The orchestrator: one purchase request in, one published purchase order out.
//!
//! Stages run strictly in order and every failure aborts the run, with one
//! exception: if synthesis fails, the deterministic fallback record is used
//! and the run carries on. Publishing is last, so a completion message is
//! only ever sent for a PDF that was uploaded. Nothing is rolled back when a
//! later stage fails.

use crate::config::PipelineConfig;
use crate::error::PurchaseOrderError;
use crate::output::{PipelineResult, QueueMessage};
use crate::pipeline::extract;
use crate::pipeline::llm::{fallback_record, resolve_provider, CompletionClient, LlmCompletionClient, Synthesizer};
use crate::pipeline::publish::{AmqpConfig, AmqpPublisher, EventPublisher};
use crate::pipeline::render::render_purchase_order_async;
use crate::pipeline::storage::{resolve_storage_path, ObjectStore, SupabaseConfig, SupabaseStorage};
use crate::progress::Stage;
use crate::request::PurchaseRequest;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Content type of the generated document.
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Object name of the generated PDF for a request id.
pub fn output_file_name(purchase_order_id: &str) -> String {
    format!("purchase_order_{purchase_order_id}.pdf")
}

/// Generates purchase orders from purchase requests.
///
/// Holds only shared collaborator handles and immutable config, so one
/// instance can serve concurrent runs.
pub struct PurchaseOrderPipeline {
    store: Arc<dyn ObjectStore>,
    synthesizer: Synthesizer,
    publisher: Arc<dyn EventPublisher>,
    config: PipelineConfig,
}

impl PurchaseOrderPipeline {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        completion_client: Arc<dyn CompletionClient>,
        publisher: Arc<dyn EventPublisher>,
        config: PipelineConfig,
    ) -> Self {
        let synthesizer = Synthesizer::new(completion_client, config.max_tokens);
        Self {
            store,
            synthesizer,
            publisher,
            config,
        }
    }

    /// Wire the production adapters from the environment.
    ///
    /// Reads `SUPABASE_URL`, `SUPABASE_KEY` and `RABBITMQ_URL`; the model
    /// provider is resolved from `config` first, then the environment.
    pub fn from_env(config: PipelineConfig) -> Result<Self, PurchaseOrderError> {
        let store = SupabaseStorage::new(&SupabaseConfig::from_env()?)?;
        let provider = resolve_provider(&config)?;
        let publisher = AmqpPublisher::from_config(AmqpConfig::from_env()?);
        info!("Pipeline ready: model={}", config.model_or_default());

        Ok(Self::new(
            Arc::new(store),
            Arc::new(LlmCompletionClient::new(provider)),
            Arc::new(publisher),
            config,
        ))
    }

    /// Generate, store and announce the purchase order for one request.
    ///
    /// # Errors
    /// - `MissingInput` before any I/O if `proforma_url` or `id` is absent
    /// - any stage error from download onwards, except synthesis
    pub async fn run(&self, request: &PurchaseRequest) -> Result<PipelineResult, PurchaseOrderError> {
        let total_start = Instant::now();
        let proforma_url = required(request.proforma_url.as_deref(), "proforma_url")?;
        let id = required(request.id.as_deref(), "id")?;
        let bucket = self.config.bucket.as_str();
        info!("Generating purchase order {} from {}", id, proforma_url);

        // ── Step 1: Download the proforma ────────────────────────────────────
        self.stage_start(Stage::Download);
        let source_path = resolve_storage_path(proforma_url, bucket)?;
        let proforma = self.store.download(bucket, &source_path).await?;
        self.stage_complete(Stage::Download);

        // ── Step 2: Extract text ─────────────────────────────────────────────
        self.stage_start(Stage::Extract);
        let proforma_text = extract::extract_text(proforma).await?;
        debug!("Proforma text: {} chars", proforma_text.len());
        self.stage_complete(Stage::Extract);

        // ── Step 3: Synthesize (or fall back) ────────────────────────────────
        self.stage_start(Stage::Synthesize);
        let date_created = today();
        let record = match self
            .synthesizer
            .synthesize(request, &proforma_text, &date_created)
            .await
        {
            Ok(record) => record,
            Err(e) => {
                warn!("Synthesis failed for {}, using fallback purchase order: {}", id, e);
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_synthesis_fallback(e.to_string());
                }
                fallback_record(request, &date_created)
            }
        };
        self.stage_complete(Stage::Synthesize);

        // ── Step 4: Render ───────────────────────────────────────────────────
        self.stage_start(Stage::Render);
        let pdf = render_purchase_order_async(record.clone()).await?;
        self.stage_complete(Stage::Render);

        // ── Step 5: Upload ───────────────────────────────────────────────────
        self.stage_start(Stage::Upload);
        let receipt = self
            .store
            .upload(
                bucket,
                &output_file_name(id),
                pdf,
                PDF_CONTENT_TYPE,
                self.config.upsert,
            )
            .await?;
        self.stage_complete(Stage::Upload);

        // ── Step 6: Public URL ───────────────────────────────────────────────
        self.stage_start(Stage::ResolveUrl);
        let pdf_url = self.store.public_url(bucket, &receipt.path)?;
        self.stage_complete(Stage::ResolveUrl);

        // ── Step 7: Publish ──────────────────────────────────────────────────
        self.stage_start(Stage::Publish);
        let message = QueueMessage {
            purchase_order_id: id.to_string(),
            pdf_url: pdf_url.clone(),
        };
        let payload = message
            .to_bytes()
            .map_err(|e| PurchaseOrderError::Internal(format!("Queue message encoding: {e}")))?;
        self.publisher
            .publish(&self.config.queue_name, &payload)
            .await?;
        self.stage_complete(Stage::Publish);

        info!(
            "Purchase order {} published in {}ms: {}",
            id,
            total_start.elapsed().as_millis(),
            pdf_url
        );
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_pipeline_complete(id, &pdf_url);
        }

        Ok(PipelineResult {
            purchase_order: record,
            pdf_path: receipt.path,
            pdf_url,
        })
    }

    /// Synchronous wrapper around [`run`](Self::run).
    ///
    /// Creates a temporary tokio runtime internally.
    pub fn run_sync(&self, request: &PurchaseRequest) -> Result<PipelineResult, PurchaseOrderError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| PurchaseOrderError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.run(request))
    }

    fn stage_start(&self, stage: Stage) {
        debug!("Stage started: {}", stage);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_stage_start(stage);
        }
    }

    fn stage_complete(&self, stage: Stage) {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_stage_complete(stage);
        }
    }
}

fn required<'a>(value: Option<&'a str>, field: &'static str) -> Result<&'a str, PurchaseOrderError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(PurchaseOrderError::MissingInput { field })
}

/// Local calendar date, `YYYY-MM-DD`.
fn today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}
