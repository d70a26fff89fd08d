//! printpdf backend for `ReportLayout`.
//!
//! Output is a pure function of the layout, the title and the creation
//! time: document dates are pinned to `created` and the trailer `/ID` is
//! derived from the title and that time.

use std::io::BufWriter;

use chrono::{DateTime, Utc};
use printpdf::lopdf::{self, Object, StringFormat};
use printpdf::*;

use super::layout::{DrawOp, ReportLayout, RgbColor, PAGE_HEIGHT_MM, PAGE_WIDTH_MM};
use super::ReportError;
use crate::pipeline::hash::hash_bytes;

fn fill(color: RgbColor) -> Color {
    let RgbColor(r, g, b) = color;
    Color::Rgb(Rgb::new(
        r as f32 / 255.0,
        g as f32 / 255.0,
        b as f32 / 255.0,
        None,
    ))
}

/// 32 hex characters identifying one rendition of one report.
fn document_id(title: &str, created: DateTime<Utc>) -> String {
    let seed = format!("{title}\n{}", created.timestamp());
    hash_bytes(seed.as_bytes()).as_str()[..32].to_string()
}

/// Render every page of `layout` into a PDF document.
pub fn render_pdf(
    layout: &ReportLayout,
    title: &str,
    created: DateTime<Utc>,
) -> Result<Vec<u8>, ReportError> {
    let date = OffsetDateTime::from_unix_timestamp(created.timestamp())
        .map_err(|e| ReportError::Render(format!("PDF date out of range: {e}")))?;
    let id = document_id(title, created);

    let (doc, page1, layer1) =
        PdfDocument::new(title, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
    let doc = doc
        .with_document_id(id.clone())
        .with_creation_date(date)
        .with_mod_date(date)
        .with_metadata_date(date);
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| ReportError::Render(format!("PDF font error: {e}")))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| ReportError::Render(format!("PDF font error: {e}")))?;

    for (index, page) in layout.pages.iter().enumerate() {
        let layer = if index == 0 {
            doc.get_page(page1).get_layer(layer1)
        } else {
            let (p, l) = doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
            doc.get_page(p).get_layer(l)
        };

        for op in &page.ops {
            match op {
                DrawOp::FilledRect { x, y, width, height, color } => {
                    layer.set_fill_color(fill(*color));
                    // Top-down model, bottom-up PDF.
                    let rect = Rect::new(
                        Mm(*x),
                        Mm(PAGE_HEIGHT_MM - (y + height)),
                        Mm(x + width),
                        Mm(PAGE_HEIGHT_MM - y),
                    )
                    .with_mode(path::PaintMode::Fill);
                    layer.add_rect(rect);
                }
                DrawOp::Text { text, x, y, size, bold: is_bold, color } => {
                    layer.set_fill_color(fill(*color));
                    let face = if *is_bold { &bold } else { &font };
                    layer.use_text(text.as_str(), *size, Mm(*x), Mm(PAGE_HEIGHT_MM - y), face);
                }
            }
        }
    }

    let mut buf = BufWriter::new(Vec::new());
    doc.save(&mut buf)
        .map_err(|e| ReportError::Render(format!("PDF save error: {e}")))?;
    let bytes = buf
        .into_inner()
        .map_err(|e| ReportError::Render(format!("PDF buffer error: {e}")))?;

    pin_trailer_id(&bytes, &id)
}

/// printpdf fills the trailer `/ID` pair with generated strings on every
/// save; replace both halves with `id`.
fn pin_trailer_id(bytes: &[u8], id: &str) -> Result<Vec<u8>, ReportError> {
    let mut pdf = lopdf::Document::load_mem(bytes)
        .map_err(|e| ReportError::Render(format!("PDF reload error: {e}")))?;
    let id = Object::String(id.as_bytes().to_vec(), StringFormat::Literal);
    pdf.trailer.set("ID", Object::Array(vec![id.clone(), id]));

    let mut out = Vec::with_capacity(bytes.len());
    pdf.save_to(&mut out)
        .map_err(|e| ReportError::Render(format!("PDF save error: {e}")))?;
    Ok(out)
}
