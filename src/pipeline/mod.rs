//! Pipeline stages for purchase-order generation.
//!
//! Each submodule implements exactly one step, so each is independently
//! testable and the external services (object storage, model, broker) stay
//! behind traits that the orchestrator in [`crate::generate`] composes.
//!
//! ## Data Flow
//!
//! ```text
//! storage ──▶ extract ──▶ llm ──▶ postprocess ──▶ layout ──▶ render ──▶ storage ──▶ publish
//! (download)  (lopdf)     (model)  (JSON cleanup)  (pages)    (lopdf)    (upload)    (AMQP)
//! ```
//!
//! 1. [`storage`]: map the proforma URL to a bucket path; download and
//!    upload bytes
//! 2. [`extract`]: PDF signature check and per-page text; runs in
//!    `spawn_blocking`
//! 3. [`llm`]: one model call at temperature 0, plus the fallback record
//! 4. [`postprocess`]: strip code fences, parse, fill missing fields
//! 5. [`layout`]: pure positioning: wrapping, pagination, the items table
//! 6. [`render`]: serialise the laid-out pages to PDF bytes
//! 7. [`publish`]: durable queue, persistent message, session released on
//!    every path

pub mod extract;
pub mod layout;
pub mod llm;
pub mod postprocess;
pub mod publish;
pub mod render;
pub mod storage;
