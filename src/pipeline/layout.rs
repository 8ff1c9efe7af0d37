//! Page layout for the purchase-order document.
//!
//! Layout is separated from PDF emission: [`layout_document`] turns a record
//! into positioned text and rule operations per page, and
//! [`super::render`] serialises those pages. Keeping this half pure means the
//! flow (wrapping, pagination, table geometry) is testable without parsing
//! PDF bytes back.
//!
//! Coordinates are PDF points with the origin at the bottom-left corner. The
//! cursor moves down from the top margin; a new page starts whenever the next
//! line or row would reach the bottom margin.

use crate::output::{display_value, LineItem, PurchaseOrderRecord, NOT_AVAILABLE};

/// US Letter.
pub const PAGE_WIDTH: f32 = 612.0;
pub const PAGE_HEIGHT: f32 = 792.0;
/// One inch on every side.
pub const MARGIN: f32 = 72.0;
pub const LINE_HEIGHT: f32 = 14.0;
pub const ROW_HEIGHT: f32 = LINE_HEIGHT * 1.5;
pub const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;

/// Fractions of [`CONTENT_WIDTH`] for Item, Qty, Unit Price, Line Total.
pub const COLUMN_FRACTIONS: [f32; 4] = [0.40, 0.15, 0.20, 0.25];

const BODY_SIZE: f32 = 11.0;
const CELL_PADDING: f32 = 4.0;
const ELLIPSIS: &str = "...";

/// The two standard fonts the document uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Font {
    Helvetica,
    HelveticaBold,
}

impl Font {
    /// Name under which the font is registered in the page resources.
    pub fn resource_name(self) -> &'static str {
        match self {
            Font::Helvetica => "F1",
            Font::HelveticaBold => "F2",
        }
    }

    pub fn base_font(self) -> &'static str {
        match self {
            Font::Helvetica => "Helvetica",
            Font::HelveticaBold => "Helvetica-Bold",
        }
    }

    /// Advance width of `text` in points at `size`.
    pub fn text_width(self, text: &str, size: f32) -> f32 {
        let units: u32 = text.chars().map(|ch| glyph_width(self, ch)).sum();
        units as f32 * size / 1000.0
    }
}

/// One drawing instruction on a page.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    /// A single line of text with its baseline at `y`.
    Text {
        x: f32,
        y: f32,
        font: Font,
        size: f32,
        text: String,
    },
    /// A horizontal rule from `x1` to `x2` at height `y`.
    Rule { x1: f32, x2: f32, y: f32 },
}

/// Everything drawn on one page, in drawing order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageLayout {
    pub ops: Vec<DrawOp>,
}

impl PageLayout {
    /// Text content of the page, one entry per drawn line or cell.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text { text, .. } => Some(text.as_str()),
            DrawOp::Rule { .. } => None,
        })
    }
}

/// Lay out a purchase order. Always returns at least one page.
pub fn layout_document(record: &PurchaseOrderRecord) -> Vec<PageLayout> {
    let mut flow = Flow::new();

    flow.text("Purchase Order", Font::HelveticaBold, 16.0);
    flow.spacer(0.5);

    let amount = display_value(&record.amount);
    let fields = [
        ("Title", record.title.as_str()),
        ("Description", record.description.as_str()),
        ("Amount", amount.as_str()),
        ("Vendor", record.vendor_name.as_str()),
        ("Vendor Address", record.vendor_address.as_str()),
        ("Date Created", record.date_created.as_str()),
    ];
    for (label, value) in fields {
        flow.text(&format!("{label}: {value}"), Font::Helvetica, BODY_SIZE);
    }

    flow.spacer(1.0);
    flow.text("Items", Font::HelveticaBold, 13.0);
    flow.spacer(0.25);

    if record.items.is_empty() {
        flow.text("No line items provided.", Font::Helvetica, BODY_SIZE);
    } else {
        flow.row(
            ["Item", "Qty", "Unit Price", "Line Total"].map(String::from),
            Font::HelveticaBold,
        );
        for item in &record.items {
            flow.row(item_cells(item), Font::Helvetica);
        }
    }

    flow.spacer(1.0);
    if let Some(total) = record.total.as_ref().filter(|t| !t.is_null()) {
        flow.text(&format!("Total: {}", display_value(total)), Font::HelveticaBold, 12.0);
    }

    flow.finish()
}

fn item_cells(item: &LineItem) -> [String; 4] {
    let line_total = item
        .line_total()
        .map(|t| format!("{t:.2}"))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());
    [
        item.name.clone(),
        display_value(&item.quantity),
        display_value(&item.unit_price),
        line_total,
    ]
}

/// Cursor state while filling pages top to bottom.
struct Flow {
    pages: Vec<PageLayout>,
    current: PageLayout,
    cursor: f32,
}

impl Flow {
    fn new() -> Self {
        Self {
            pages: Vec::new(),
            current: PageLayout::default(),
            cursor: PAGE_HEIGHT - MARGIN,
        }
    }

    fn ensure_space(&mut self, height: f32) {
        if self.cursor - height <= MARGIN {
            let full = std::mem::take(&mut self.current);
            self.pages.push(full);
            self.cursor = PAGE_HEIGHT - MARGIN;
        }
    }

    fn text(&mut self, text: &str, font: Font, size: f32) {
        for line in wrap_text(text, font, size, CONTENT_WIDTH) {
            self.ensure_space(LINE_HEIGHT);
            self.current.ops.push(DrawOp::Text {
                x: MARGIN,
                y: self.cursor,
                font,
                size,
                text: line,
            });
            self.cursor -= LINE_HEIGHT;
        }
    }

    fn spacer(&mut self, multiplier: f32) {
        self.cursor -= LINE_HEIGHT * multiplier;
    }

    /// Rule across the table at the row top, cells one baseline below it.
    fn row(&mut self, cells: [String; 4], font: Font) {
        self.ensure_space(ROW_HEIGHT);
        let baseline = self.cursor - (ROW_HEIGHT - LINE_HEIGHT + 2.0);

        let mut x = MARGIN;
        for (cell, fraction) in cells.into_iter().zip(COLUMN_FRACTIONS) {
            let width = CONTENT_WIDTH * fraction;
            let text = fit_to_width(&cell, font, BODY_SIZE, width - 2.0 * CELL_PADDING);
            if !text.is_empty() {
                self.current.ops.push(DrawOp::Text {
                    x: x + CELL_PADDING,
                    y: baseline,
                    font,
                    size: BODY_SIZE,
                    text,
                });
            }
            x += width;
        }

        self.current.ops.push(DrawOp::Rule {
            x1: MARGIN,
            x2: MARGIN + CONTENT_WIDTH,
            y: self.cursor,
        });
        self.cursor -= ROW_HEIGHT;
    }

    fn finish(mut self) -> Vec<PageLayout> {
        if !self.current.ops.is_empty() || self.pages.is_empty() {
            self.pages.push(self.current);
        }
        self.pages
    }
}

/// Greedy word wrap. Explicit newlines start a new line; a single word wider
/// than `max_width` is split between characters.
pub fn wrap_text(text: &str, font: Font, size: f32, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if line.is_empty() {
                word.to_string()
            } else {
                format!("{line} {word}")
            };

            if font.text_width(&candidate, size) <= max_width {
                line = candidate;
                continue;
            }

            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }

            if font.text_width(word, size) <= max_width {
                line = word.to_string();
            } else {
                for ch in word.chars() {
                    let mut widened = line.clone();
                    widened.push(ch);
                    if !line.is_empty() && font.text_width(&widened, size) > max_width {
                        lines.push(std::mem::take(&mut line));
                        line.push(ch);
                    } else {
                        line = widened;
                    }
                }
            }
        }
        if !line.is_empty() {
            lines.push(line);
        }
    }

    lines
}

/// Shorten `text` with a trailing `...` until it fits `max_width`.
pub fn fit_to_width(text: &str, font: Font, size: f32, max_width: f32) -> String {
    if font.text_width(text, size) <= max_width {
        return text.to_string();
    }

    let mut chars: Vec<char> = text.chars().collect();
    while !chars.is_empty() {
        chars.pop();
        let candidate: String = chars.iter().collect::<String>() + ELLIPSIS;
        if font.text_width(&candidate, size) <= max_width {
            return candidate;
        }
    }
    ELLIPSIS.to_string()
}

/// Advance widths (1/1000 em) for printable ASCII, from the standard
/// Helvetica and Helvetica-Bold AFM metrics. Anything else is measured as a
/// digit.
fn glyph_width(font: Font, ch: char) -> u32 {
    const REGULAR: [u16; 95] = [
        278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
        556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0'..'9'
        278, 278, 584, 584, 584, 556, 1015, // ':'..'@'
        667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // 'A'..'M'
        722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // 'N'..'Z'
        278, 278, 278, 469, 556, 333, // '['..'`'
        556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // 'a'..'m'
        556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // 'n'..'z'
        334, 260, 334, 584, // '{'..'~'
    ];
    const BOLD: [u16; 95] = [
        278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
        556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0'..'9'
        333, 333, 584, 584, 584, 611, 975, // ':'..'@'
        722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, // 'A'..'M'
        722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // 'N'..'Z'
        333, 278, 333, 584, 556, 333, // '['..'`'
        556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, // 'a'..'m'
        611, 611, 611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, // 'n'..'z'
        389, 280, 389, 584, // '{'..'~'
    ];
    let table = match font {
        Font::Helvetica => &REGULAR,
        Font::HelveticaBold => &BOLD,
    };
    match ch as u32 {
        code @ 32..=126 => u32::from(table[(code - 32) as usize]),
        _ => 556,
    }
}
