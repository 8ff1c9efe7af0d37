//! PDF emission: serialise laid-out pages with lopdf.
//!
//! ## Why spawn_blocking?
//!
//! Building and serialising the object graph is synchronous CPU work. The
//! async entry point moves it onto the blocking pool so a large order does
//! not stall a Tokio worker thread.
//!
//! ## Determinism
//!
//! The writer emits no document ID, no creation date and no producer string,
//! so the same record always yields the same bytes. Re-running a request with
//! upsert therefore replaces the stored PDF with an identical one.

use crate::error::PurchaseOrderError;
use crate::output::PurchaseOrderRecord;
use crate::pipeline::layout::{layout_document, DrawOp, Font, PageLayout, PAGE_HEIGHT, PAGE_WIDTH};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream, StringFormat};
use tracing::debug;

/// Render a purchase order off the async runtime.
pub async fn render_purchase_order_async(
    record: PurchaseOrderRecord,
) -> Result<Vec<u8>, PurchaseOrderError> {
    tokio::task::spawn_blocking(move || render_purchase_order(&record))
        .await
        .map_err(|e| PurchaseOrderError::Internal(format!("Render task panicked: {}", e)))?
}

/// Render a purchase order to PDF bytes.
pub fn render_purchase_order(record: &PurchaseOrderRecord) -> Result<Vec<u8>, PurchaseOrderError> {
    let pages = layout_document(record);
    let bytes = write_pdf(&pages)?;
    debug!("Rendered purchase order: {} page(s), {} bytes", pages.len(), bytes.len());
    Ok(bytes)
}

fn render_error(e: impl std::fmt::Display) -> PurchaseOrderError {
    PurchaseOrderError::Render {
        detail: e.to_string(),
    }
}

fn font_dictionary(font: Font) -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => font.base_font(),
        "Encoding" => "WinAnsiEncoding",
    }
}

fn write_pdf(pages: &[PageLayout]) -> Result<Vec<u8>, PurchaseOrderError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(font_dictionary(Font::Helvetica));
    let bold_id = doc.add_object(font_dictionary(Font::HelveticaBold));
    let resources = dictionary! {
        "Font" => dictionary! {
            Font::Helvetica.resource_name() => regular_id,
            Font::HelveticaBold.resource_name() => bold_id,
        },
    };

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for page in pages {
        let content = Content {
            operations: page_operations(page),
        };
        let encoded = content.encode().map_err(render_error)?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources.clone(),
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).map_err(render_error)?;
    Ok(bytes)
}

fn page_operations(page: &PageLayout) -> Vec<Operation> {
    let mut operations = Vec::new();
    for op in &page.ops {
        match op {
            DrawOp::Text {
                x,
                y,
                font,
                size,
                text,
            } => {
                operations.push(Operation::new("BT", vec![]));
                operations.push(Operation::new(
                    "Tf",
                    vec![font.resource_name().into(), (*size).into()],
                ));
                operations.push(Operation::new("Td", vec![(*x).into(), (*y).into()]));
                operations.push(Operation::new(
                    "Tj",
                    vec![Object::String(encode_win_ansi(text), StringFormat::Literal)],
                ));
                operations.push(Operation::new("ET", vec![]));
            }
            DrawOp::Rule { x1, x2, y } => {
                operations.push(Operation::new("m", vec![(*x1).into(), (*y).into()]));
                operations.push(Operation::new("l", vec![(*x2).into(), (*y).into()]));
                operations.push(Operation::new("S", vec![]));
            }
        }
    }
    operations
}

/// Encode text for a WinAnsi standard font. Latin-1 passes through, the
/// common typographic punctuation maps to its 0x80-0x9F slot, anything else
/// becomes `?`.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| match ch {
            '€' => 0x80,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '\u{20}'..='\u{7e}' | '\u{a0}'..='\u{ff}' => ch as u8,
            _ => b'?',
        })
        .collect()
}
