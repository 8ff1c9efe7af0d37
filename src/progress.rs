//! Progress-callback trait for pipeline stage events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to observe a
//! run as it moves from stage to stage. The CLI uses this to drive its
//! spinner; services can forward the events to metrics or an audit log.
//!
//! # Example
//!
//! ```rust
//! use purchase_order_pipeline::{PipelineConfig, PipelineProgressCallback, Stage};
//! use std::sync::{Arc, Mutex};
//!
//! struct StageLog(Mutex<Vec<Stage>>);
//!
//! impl PipelineProgressCallback for StageLog {
//!     fn on_stage_complete(&self, stage: Stage) {
//!         self.0.lock().unwrap().push(stage);
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(Arc::new(StageLog(Mutex::new(vec![]))))
//!     .build()
//!     .unwrap();
//! ```

use std::fmt;
use std::sync::Arc;

/// The pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Download,
    Extract,
    Synthesize,
    Render,
    Upload,
    ResolveUrl,
    Publish,
}

impl Stage {
    /// Every stage in the order a run visits them.
    pub const ALL: [Stage; 7] = [
        Stage::Download,
        Stage::Extract,
        Stage::Synthesize,
        Stage::Render,
        Stage::Upload,
        Stage::ResolveUrl,
        Stage::Publish,
    ];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Download => "Downloading proforma",
            Stage::Extract => "Extracting text",
            Stage::Synthesize => "Generating purchase order",
            Stage::Render => "Rendering PDF",
            Stage::Upload => "Uploading PDF",
            Stage::ResolveUrl => "Resolving public URL",
            Stage::Publish => "Publishing completion message",
        };
        f.write_str(label)
    }
}

/// Called by the pipeline as a run progresses.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Implementations must be `Send + Sync`: one pipeline
/// may serve several concurrent runs.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called just before a stage starts.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when a stage finished without error.
    fn on_stage_complete(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when synthesis failed and the fallback record is used instead.
    ///
    /// # Arguments
    /// * `reason`: human-readable description of the synthesis failure
    fn on_synthesis_fallback(&self, reason: String) {
        let _ = reason;
    }

    /// Called once after the completion message was published.
    fn on_pipeline_complete(&self, purchase_order_id: &str, pdf_url: &str) {
        let _ = (purchase_order_id, pdf_url);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;
