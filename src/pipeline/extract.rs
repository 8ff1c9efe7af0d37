//! Text extraction from the downloaded proforma.
//!
//! lopdf parses the whole document in memory and walks each page's content
//! stream. That is CPU-bound, so the async entry point moves it onto the
//! blocking pool the same way rendering does.

use crate::error::PurchaseOrderError;
use lopdf::Document;
use tracing::{debug, warn};

/// Signature every PDF starts with.
pub const PDF_MAGIC: &[u8] = b"%PDF";

/// Extract all page text, in page order, joined by `\n`.
pub async fn extract_text(bytes: Vec<u8>) -> Result<String, PurchaseOrderError> {
    tokio::task::spawn_blocking(move || extract_text_blocking(&bytes))
        .await
        .map_err(|e| PurchaseOrderError::Internal(format!("Extraction task panicked: {}", e)))?
}

/// Blocking implementation of text extraction.
///
/// Pages with no extractable text are skipped, so a scanned proforma yields
/// an empty string rather than an error.
pub fn extract_text_blocking(bytes: &[u8]) -> Result<String, PurchaseOrderError> {
    if !bytes.starts_with(PDF_MAGIC) {
        return Err(PurchaseOrderError::UnsupportedFormat {
            magic: bytes.iter().take(PDF_MAGIC.len()).copied().collect(),
        });
    }

    let document = Document::load_mem(bytes).map_err(|e| PurchaseOrderError::CorruptDocument {
        detail: e.to_string(),
    })?;

    let pages = document.get_pages();
    let mut texts = Vec::with_capacity(pages.len());

    for page_number in pages.keys() {
        match document.extract_text(&[*page_number]) {
            Ok(text) => {
                let text = text.trim_end();
                if !text.is_empty() {
                    texts.push(text.to_string());
                }
            }
            Err(e) => warn!("Skipping page {}: {}", page_number, e),
        }
    }

    debug!("Extracted text from {}/{} pages", texts.len(), pages.len());
    Ok(texts.join("\n"))
}
