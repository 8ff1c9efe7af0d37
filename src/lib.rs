//! # purchase-order-pipeline
//!
//! Turn a purchase request plus its vendor proforma invoice into a formatted
//! purchase-order PDF, store it, and announce it on a message queue.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PurchaseRequest { id, title, description, amount, proforma_url }
//!  │
//!  ├─ 1. Download  proforma from object storage (Supabase Storage)
//!  ├─ 2. Extract   page text via lopdf (CPU-bound, spawn_blocking)
//!  ├─ 3. Generate  one model call at temperature 0 → JSON record
//!  │               └─ on any failure: deterministic fallback record
//!  ├─ 4. Render    Letter-size PDF: fields, items table, total
//!  ├─ 5. Upload    purchase_order_{id}.pdf (upsert)
//!  ├─ 6. Resolve   public URL of the upload
//!  └─ 7. Publish   {"purchase_order_id", "pdf_url"} → durable AMQP queue
//! ```
//!
//! Every stage except generation is fatal on failure. Publishing comes last,
//! so a completion message always points at an uploaded document.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use purchase_order_pipeline::{PipelineConfig, PurchaseOrderPipeline, PurchaseRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // SUPABASE_URL, SUPABASE_KEY, RABBITMQ_URL and OPENAI_API_KEY from the environment
//!     let pipeline = PurchaseOrderPipeline::from_env(PipelineConfig::default())?;
//!     let request = PurchaseRequest::new(
//!         "42",
//!         "https://xyz.supabase.co/storage/v1/object/public/purchase_orders/proforma_42.pdf",
//!     )
//!     .with_title("Office Chairs");
//!     let result = pipeline.run(&request).await?;
//!     println!("{}", result.pdf_url);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `po-gen` binary (clap + anyhow + tracing-subscriber + dotenvy) |
//!
//! Disable `cli` when embedding the library in a service:
//! ```toml
//! purchase-order-pipeline = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod generate;
pub mod handler;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod request;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use error::{PurchaseOrderError, SynthesisError};
pub use generate::PurchaseOrderPipeline;
pub use handler::{handle_event, request_from_event, InvocationResponse};
pub use output::{LineItem, PipelineResult, PurchaseOrderRecord, QueueMessage};
pub use pipeline::llm::{fallback_record, CompletionClient};
pub use pipeline::publish::{AmqpConfig, EventPublisher};
pub use pipeline::render::render_purchase_order;
pub use pipeline::storage::{resolve_storage_path, ObjectStore, SupabaseConfig, UploadReceipt};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback, Stage};
pub use request::PurchaseRequest;
