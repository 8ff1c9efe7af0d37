//! Integration tests for the full purchase-order pipeline.
//!
//! The external services are replaced by in-memory doubles: an object store
//! keyed by `(bucket, path)`, a publisher that records every message, and a
//! completion client that replays a scripted answer. Proforma fixtures are
//! real PDFs produced by the crate's own renderer, so extraction runs for
//! real.
//!
//! Run with:
//!   cargo test --test pipeline -- --nocapture

use async_trait::async_trait;
use edgequake_llm::CompletionOptions;
use purchase_order_pipeline::{
    handle_event, render_purchase_order, CompletionClient, EventPublisher, LineItem, ObjectStore,
    PipelineConfig, PipelineProgressCallback, PurchaseOrderError, PurchaseOrderPipeline,
    PurchaseOrderRecord, PurchaseRequest, Stage, SynthesisError, UploadReceipt,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use tracing_subscriber::EnvFilter;

const BUCKET: &str = "purchase_orders";
const QUEUE: &str = "purchase_orders_queue";
const PUBLIC_BASE: &str = "https://store.test/storage/v1/object/public";
const PROFORMA_PATH: &str = "/proformas/acme_42.pdf";

static TRACING: Once = Once::new();

/// Route library logs through the test harness; `RUST_LOG=debug` to see them.
fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

// ── Test doubles ─────────────────────────────────────────────────────────────

#[derive(Default)]
struct MemoryStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    downloads: AtomicUsize,
    uploads: Mutex<Vec<(String, String, bool)>>,
}

impl MemoryStore {
    fn with_object(path: &str, bytes: Vec<u8>) -> Arc<Self> {
        let store = Self::default();
        store
            .objects
            .lock()
            .unwrap()
            .insert((BUCKET.to_string(), path.to_string()), bytes);
        Arc::new(store)
    }

    fn object(&self, path: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&(BUCKET.to_string(), path.to_string()))
            .cloned()
    }

    fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>, PurchaseOrderError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), path.to_string()))
            .cloned()
            .ok_or_else(|| PurchaseOrderError::Storage {
                operation: "download",
                bucket: bucket.to_string(),
                path: path.to_string(),
                reason: "Object not found".to_string(),
            })
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> Result<UploadReceipt, PurchaseOrderError> {
        self.uploads
            .lock()
            .unwrap()
            .push((path.to_string(), content_type.to_string(), upsert));

        let mut objects = self.objects.lock().unwrap();
        let key = (bucket.to_string(), path.to_string());
        if !upsert && objects.contains_key(&key) {
            return Err(PurchaseOrderError::Storage {
                operation: "upload",
                bucket: bucket.to_string(),
                path: path.to_string(),
                reason: "The resource already exists".to_string(),
            });
        }
        objects.insert(key, data);
        Ok(UploadReceipt {
            path: path.to_string(),
        })
    }

    fn public_url(&self, bucket: &str, path: &str) -> Result<String, PurchaseOrderError> {
        Ok(format!("{PUBLIC_BASE}/{bucket}/{}", path.trim_start_matches('/')))
    }
}

#[derive(Default)]
struct RecordingPublisher {
    messages: Mutex<Vec<(String, Vec<u8>)>>,
    fail: bool,
}

impl RecordingPublisher {
    fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    fn payloads(&self) -> Vec<Value> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|(_, bytes)| serde_json::from_slice(bytes).unwrap())
            .collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, queue: &str, payload: &[u8]) -> Result<(), PurchaseOrderError> {
        if self.fail {
            return Err(PurchaseOrderError::Publish {
                queue: queue.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        self.messages
            .lock()
            .unwrap()
            .push((queue.to_string(), payload.to_vec()));
        Ok(())
    }
}

struct ScriptedClient {
    answer: Result<String, SynthesisError>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedClient {
    fn answering(answer: &str) -> Arc<Self> {
        Arc::new(Self {
            answer: Ok(answer.to_string()),
            prompts: Mutex::new(vec![]),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            answer: Err(SynthesisError::ModelCall("503 Service Unavailable".into())),
            prompts: Mutex::new(vec![]),
        })
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(
        &self,
        prompt: &str,
        _options: &CompletionOptions,
    ) -> Result<String, SynthesisError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.answer.clone()
    }
}

#[derive(Default)]
struct StageRecorder {
    completed: Mutex<Vec<Stage>>,
    fallbacks: Mutex<Vec<String>>,
    finished: Mutex<Option<(String, String)>>,
}

impl PipelineProgressCallback for StageRecorder {
    fn on_stage_complete(&self, stage: Stage) {
        self.completed.lock().unwrap().push(stage);
    }

    fn on_synthesis_fallback(&self, reason: String) {
        self.fallbacks.lock().unwrap().push(reason);
    }

    fn on_pipeline_complete(&self, purchase_order_id: &str, pdf_url: &str) {
        *self.finished.lock().unwrap() = Some((purchase_order_id.to_string(), pdf_url.to_string()));
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────────

const MODEL_ANSWER: &str = r#"```json
{
  "title": "Office Chairs",
  "description": "Ergonomic chairs for the HR floor",
  "amount": 2500,
  "vendor_name": "ACME Ltd",
  "vendor_address": "1 Industrial Road, Kigali",
  "items": [{"name": "Ergonomic Chair", "quantity": 10, "unit_price": 250}],
  "total": 2500
}
```"#;

fn proforma_pdf() -> Vec<u8> {
    let proforma = PurchaseOrderRecord {
        title: "Proforma Invoice PI-2024-118".into(),
        description: "Quotation valid for 30 days".into(),
        amount: json!(2500),
        vendor_name: "ACME Ltd".into(),
        vendor_address: "1 Industrial Road, Kigali".into(),
        date_created: "2024-05-02".into(),
        items: vec![LineItem::new("Ergonomic Chair", 10, 250)],
        total: Some(json!(2500)),
    };
    render_purchase_order(&proforma).unwrap()
}

fn proforma_url() -> String {
    format!("{PUBLIC_BASE}/{BUCKET}{PROFORMA_PATH}")
}

fn request() -> PurchaseRequest {
    PurchaseRequest::new("42", proforma_url())
        .with_title("Office Chairs")
        .with_amount(2500)
}

struct Harness {
    pipeline: PurchaseOrderPipeline,
    store: Arc<MemoryStore>,
    client: Arc<ScriptedClient>,
    publisher: Arc<RecordingPublisher>,
}

fn harness_with(
    store: Arc<MemoryStore>,
    client: Arc<ScriptedClient>,
    publisher: Arc<RecordingPublisher>,
    config: PipelineConfig,
) -> Harness {
    init_tracing();
    let pipeline = PurchaseOrderPipeline::new(
        store.clone(),
        client.clone(),
        publisher.clone(),
        config,
    );
    Harness {
        pipeline,
        store,
        client,
        publisher,
    }
}

fn harness(client: Arc<ScriptedClient>) -> Harness {
    harness_with(
        MemoryStore::with_object(PROFORMA_PATH, proforma_pdf()),
        client,
        Arc::new(RecordingPublisher::default()),
        PipelineConfig::default(),
    )
}

// ── End to end ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn generates_uploads_and_publishes_once() {
    let h = harness(ScriptedClient::answering(MODEL_ANSWER));

    let result = h.pipeline.run(&request()).await.unwrap();

    let expected_url = format!("{PUBLIC_BASE}/{BUCKET}/purchase_order_42.pdf");
    assert_eq!(result.pdf_url, expected_url);
    assert_eq!(result.pdf_path, "purchase_order_42.pdf");
    assert_eq!(result.purchase_order.vendor_name, "ACME Ltd");
    assert_eq!(result.purchase_order.total, Some(json!(2500)));

    let messages = h.publisher.messages.lock().unwrap().clone();
    assert_eq!(messages.len(), 1, "exactly one completion message");
    assert_eq!(messages[0].0, QUEUE);
    assert_eq!(
        serde_json::from_slice::<Value>(&messages[0].1).unwrap(),
        json!({ "purchase_order_id": "42", "pdf_url": expected_url })
    );

    let pdf = h.store.object("purchase_order_42.pdf").expect("uploaded PDF");
    assert!(pdf.starts_with(b"%PDF"));
    assert_eq!(
        h.store.uploads.lock().unwrap()[0],
        ("purchase_order_42.pdf".to_string(), "application/pdf".to_string(), true)
    );
}

#[tokio::test]
async fn prompt_carries_request_and_proforma_text() {
    let h = harness(ScriptedClient::answering(MODEL_ANSWER));
    h.pipeline.run(&request()).await.unwrap();

    let prompts = h.client.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1, "one model call, no retry");
    assert!(prompts[0].contains("- ID: 42"));
    assert!(prompts[0].contains("- Title: Office Chairs"));
    assert!(prompts[0].contains("Vendor: ACME Ltd"), "proforma text missing from prompt");
    assert!(prompts[0].contains("PI-2024-118"));
}

#[tokio::test]
async fn rerun_overwrites_the_same_object() {
    let h = harness(ScriptedClient::answering(MODEL_ANSWER));

    let first = h.pipeline.run(&request()).await.unwrap();
    let second = h.pipeline.run(&request()).await.unwrap();

    assert_eq!(first.pdf_url, second.pdf_url);
    // The proforma plus a single purchase order.
    assert_eq!(h.store.object_count(), 2);
    assert_eq!(h.publisher.payloads().len(), 2);
}

#[tokio::test]
async fn rerun_without_upsert_fails_on_conflict() {
    let config = PipelineConfig::builder().upsert(false).build().unwrap();
    let h = harness_with(
        MemoryStore::with_object(PROFORMA_PATH, proforma_pdf()),
        ScriptedClient::answering(MODEL_ANSWER),
        Arc::new(RecordingPublisher::default()),
        config,
    );

    h.pipeline.run(&request()).await.unwrap();
    let err = h.pipeline.run(&request()).await.unwrap_err();

    assert!(matches!(err, PurchaseOrderError::Storage { operation: "upload", .. }), "{err:?}");
    assert_eq!(h.publisher.payloads().len(), 1, "no message for the failed run");
}

// ── Input validation ─────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_proforma_touches_nothing() {
    let h = harness(ScriptedClient::answering(MODEL_ANSWER));
    let mut req = request();
    req.proforma_url = None;

    let err = h.pipeline.run(&req).await.unwrap_err();

    assert!(matches!(err, PurchaseOrderError::MissingInput { field: "proforma_url" }));
    assert_eq!(h.store.downloads.load(Ordering::SeqCst), 0);
    assert!(h.store.uploads.lock().unwrap().is_empty());
    assert_eq!(h.client.calls(), 0);
    assert!(h.publisher.payloads().is_empty());
}

#[tokio::test]
async fn missing_id_touches_nothing() {
    let h = harness(ScriptedClient::answering(MODEL_ANSWER));
    let mut req = request();
    req.id = Some("   ".into());

    let err = h.pipeline.run(&req).await.unwrap_err();

    assert!(matches!(err, PurchaseOrderError::MissingInput { field: "id" }));
    assert_eq!(h.store.downloads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn non_pdf_proforma_is_rejected() {
    let h = harness_with(
        MemoryStore::with_object(PROFORMA_PATH, b"PK\x03\x04 this is a zip".to_vec()),
        ScriptedClient::answering(MODEL_ANSWER),
        Arc::new(RecordingPublisher::default()),
        PipelineConfig::default(),
    );

    let err = h.pipeline.run(&request()).await.unwrap_err();

    assert!(matches!(err, PurchaseOrderError::UnsupportedFormat { .. }), "{err:?}");
    assert_eq!(h.client.calls(), 0);
    assert!(h.store.uploads.lock().unwrap().is_empty());
    assert!(h.publisher.payloads().is_empty());
}

#[tokio::test]
async fn absent_proforma_object_is_storage_error() {
    let h = harness_with(
        Arc::new(MemoryStore::default()),
        ScriptedClient::answering(MODEL_ANSWER),
        Arc::new(RecordingPublisher::default()),
        PipelineConfig::default(),
    );

    let err = h.pipeline.run(&request()).await.unwrap_err();

    match err {
        PurchaseOrderError::Storage { operation, path, .. } => {
            assert_eq!(operation, "download");
            assert_eq!(path, PROFORMA_PATH);
        }
        other => panic!("unexpected {other:?}"),
    }
}

// ── Fallback ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn model_failure_falls_back_and_still_publishes() {
    let recorder = Arc::new(StageRecorder::default());
    let config = PipelineConfig::builder()
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let h = harness_with(
        MemoryStore::with_object(PROFORMA_PATH, proforma_pdf()),
        ScriptedClient::failing(),
        Arc::new(RecordingPublisher::default()),
        config,
    );

    let result = h.pipeline.run(&request()).await.unwrap();
    let po = &result.purchase_order;

    assert_eq!(po.title, "Office Chairs");
    assert_eq!(po.amount, json!(2500));
    assert_eq!(po.vendor_name, "OfficeSupplies Co.");
    assert_eq!(po.vendor_address, "123 Main Street, Kigali, Rwanda");
    assert_eq!(po.items.len(), 3);
    assert_eq!(po.total, Some(json!(5015)));

    assert_eq!(h.client.calls(), 1);
    assert_eq!(h.publisher.payloads().len(), 1);

    let fallbacks = recorder.fallbacks.lock().unwrap();
    assert_eq!(fallbacks.len(), 1);
    assert!(fallbacks[0].contains("503"));
}

#[tokio::test]
async fn prose_answer_falls_back() {
    let h = harness(ScriptedClient::answering(
        "I'm sorry, I could not find a purchase order in this document.",
    ));

    let result = h.pipeline.run(&request()).await.unwrap();

    assert_eq!(result.purchase_order.total, Some(json!(5015)));
    assert_eq!(result.purchase_order.vendor_name, "OfficeSupplies Co.");
}

// ── Failure propagation ──────────────────────────────────────────────────────

#[tokio::test]
async fn publish_failure_propagates_after_upload() {
    let h = harness_with(
        MemoryStore::with_object(PROFORMA_PATH, proforma_pdf()),
        ScriptedClient::answering(MODEL_ANSWER),
        RecordingPublisher::failing(),
        PipelineConfig::default(),
    );

    let err = h.pipeline.run(&request()).await.unwrap_err();

    assert!(matches!(err, PurchaseOrderError::Publish { .. }), "{err:?}");
    // No compensation: the upload stays.
    assert!(h.store.object("purchase_order_42.pdf").is_some());
}

// ── Progress ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn stages_complete_in_order() {
    let recorder = Arc::new(StageRecorder::default());
    let config = PipelineConfig::builder()
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let h = harness_with(
        MemoryStore::with_object(PROFORMA_PATH, proforma_pdf()),
        ScriptedClient::answering(MODEL_ANSWER),
        Arc::new(RecordingPublisher::default()),
        config,
    );

    let result = h.pipeline.run(&request()).await.unwrap();

    assert_eq!(*recorder.completed.lock().unwrap(), Stage::ALL.to_vec());
    assert!(recorder.fallbacks.lock().unwrap().is_empty());
    assert_eq!(
        recorder.finished.lock().unwrap().clone(),
        Some(("42".to_string(), result.pdf_url))
    );
}

// ── Concurrency & sync entry points ──────────────────────────────────────────

#[tokio::test]
async fn shared_pipeline_serves_concurrent_runs() {
    let h = harness(ScriptedClient::answering(MODEL_ANSWER));
    let pipeline = Arc::new(h.pipeline);

    let tasks: Vec<_> = ["7", "8"]
        .into_iter()
        .map(|id| {
            let pipeline = Arc::clone(&pipeline);
            tokio::spawn(async move {
                let req = PurchaseRequest::new(id, proforma_url());
                pipeline.run(&req).await
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let mut ids: Vec<String> = h
        .publisher
        .payloads()
        .iter()
        .map(|p| p["purchase_order_id"].as_str().unwrap().to_string())
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["7", "8"]);
    assert!(h.store.object("purchase_order_7.pdf").is_some());
    assert!(h.store.object("purchase_order_8.pdf").is_some());
}

#[test]
fn run_under_block_on() {
    let h = harness(ScriptedClient::answering(MODEL_ANSWER));
    let result = tokio_test::block_on(h.pipeline.run(&request())).unwrap();
    assert!(result.pdf_url.ends_with("purchase_order_42.pdf"));
}

#[test]
fn run_sync_creates_its_own_runtime() {
    let h = harness(ScriptedClient::failing());
    let result = h.pipeline.run_sync(&request()).unwrap();
    assert_eq!(result.purchase_order.total, Some(json!(5015)));
}

// ── Invocation handler ───────────────────────────────────────────────────────

#[tokio::test]
async fn gateway_event_returns_200() {
    let h = harness(ScriptedClient::answering(MODEL_ANSWER));
    let body = json!({
        "id": 42,
        "title": "Office Chairs",
        "amount": 2500,
        "proforma": proforma_url(),
    });
    let event = json!({ "body": body.to_string() });

    let response = handle_event(&h.pipeline, &event).await;

    assert_eq!(response.status_code, 200);
    assert_eq!(response.body["message"], "Purchase order generated successfully");
    assert_eq!(response.body["purchase_order_id"], "42");
    assert_eq!(
        response.body["pdf_url"],
        format!("{PUBLIC_BASE}/{BUCKET}/purchase_order_42.pdf")
    );
}

#[tokio::test]
async fn malformed_gateway_body_returns_400() {
    let h = harness(ScriptedClient::answering(MODEL_ANSWER));

    let response = handle_event(&h.pipeline, &json!({ "body": "{\"id\": 42," })).await;

    assert_eq!(response.status_code, 400);
    assert_eq!(response.body["error"], "Invalid JSON in request body");
    assert_eq!(h.store.downloads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn event_without_proforma_returns_400() {
    let h = harness(ScriptedClient::answering(MODEL_ANSWER));

    let response = handle_event(&h.pipeline, &json!({ "id": "42", "title": "Chairs" })).await;

    assert_eq!(response.status_code, 400);
    assert!(h.publisher.payloads().is_empty());
}

#[tokio::test]
async fn downstream_failure_returns_500() {
    let h = harness_with(
        MemoryStore::with_object(PROFORMA_PATH, proforma_pdf()),
        ScriptedClient::answering(MODEL_ANSWER),
        RecordingPublisher::failing(),
        PipelineConfig::default(),
    );
    let event = json!({ "id": "42", "proforma_url": proforma_url() });

    let response = handle_event(&h.pipeline, &event).await;

    assert_eq!(response.status_code, 500);
    assert_eq!(
        response.body["error"],
        "Internal server error processing purchase order"
    );
}
