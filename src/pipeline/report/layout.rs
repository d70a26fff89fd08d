//! Page model for the scan report.
//!
//! Coordinates are millimetres from the top-left corner of an A4 page, so
//! the model reads in the same order it is built. The PDF backend flips the
//! y axis when drawing.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::models::{Detection, PatientInfo, RiskLevel, ScanResult};

pub const PAGE_WIDTH_MM: f32 = 210.0;
pub const PAGE_HEIGHT_MM: f32 = 297.0;
pub const MARGIN_MM: f32 = 20.0;

/// Findings start a new page once the cursor passes this line.
pub const FINDINGS_BREAK_Y: f32 = PAGE_HEIGHT_MM - 60.0;
/// The disclaimer needs this much room below the cursor or moves to a new page.
pub const DISCLAIMER_BREAK_Y: f32 = PAGE_HEIGHT_MM - 80.0;
const DISCLAIMER_BOX_HEIGHT: f32 = 50.0;
const VALUE_COLUMN: f32 = MARGIN_MM + 50.0;

pub const FOOTER_TEXT: &str = "PneumAI - AI-Powered Lung Cancer Detection System";
pub const DISCLAIMER_TITLE: &str = "IMPORTANT MEDICAL DISCLAIMER";
pub const DISCLAIMER_LINES: [&str; 5] = [
    "These results are generated by an AI-powered analysis system and should not be",
    "used as the sole basis for medical decisions. This report is intended to assist",
    "healthcare professionals and should be reviewed by a qualified radiologist or",
    "physician. Please consult with your healthcare provider for proper diagnosis",
    "and treatment recommendations.",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RgbColor(pub u8, pub u8, pub u8);

impl RgbColor {
    pub const BLACK: Self = Self(0, 0, 0);
    pub const WHITE: Self = Self(255, 255, 255);
    pub const FOOTER_GRAY: Self = Self(128, 128, 128);
    pub const INDIGO: Self = Self(79, 70, 229);
    pub const DISCLAIMER_YELLOW: Self = Self(255, 243, 205);
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Text {
        text: String,
        x: f32,
        y: f32,
        /// Points.
        size: f32,
        bold: bool,
        color: RgbColor,
    },
    FilledRect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: RgbColor,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageLayout {
    pub ops: Vec<DrawOp>,
}

impl PageLayout {
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text { text, .. } => Some(text.as_str()),
            DrawOp::FilledRect { .. } => None,
        })
    }

    pub fn contains_text(&self, needle: &str) -> bool {
        self.texts().any(|t| t.contains(needle))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportLayout {
    pub pages: Vec<PageLayout>,
}

impl ReportLayout {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Index of the first page containing `needle`.
    pub fn find_page(&self, needle: &str) -> Option<usize> {
        self.pages.iter().position(|p| p.contains_text(needle))
    }
}

pub fn risk_color(level: &RiskLevel) -> RgbColor {
    match level {
        RiskLevel::High => RgbColor(244, 67, 54),
        RiskLevel::Medium => RgbColor(255, 152, 0),
        RiskLevel::Low => RgbColor(255, 193, 7),
        RiskLevel::None => RgbColor(76, 175, 80),
        RiskLevel::Unrecognized(_) => RgbColor(150, 150, 150),
    }
}

pub fn risk_label(level: &RiskLevel) -> &'static str {
    match level {
        RiskLevel::High => "High Risk",
        RiskLevel::Medium => "Medium Risk",
        RiskLevel::Low => "Low Risk",
        RiskLevel::None => "No Risk",
        RiskLevel::Unrecognized(_) => "Unknown",
    }
}

/// `ground_glass_opacity` → `Ground Glass Opacity`.
pub fn format_class_name(class: &str) -> String {
    class
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// `Mar 4, 2026` for RFC 3339 or naive ISO timestamps; anything else is
/// shown as given.
pub fn format_scan_date(raw: &str) -> String {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(&Utc).format("%b %-d, %Y").to_string();
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return dt.format("%b %-d, %Y").to_string();
    }
    raw.to_string()
}

fn percent(confidence: f64) -> String {
    format!("{:.1}%", confidence * 100.0)
}

struct Cursor {
    pages: Vec<PageLayout>,
    y: f32,
}

impl Cursor {
    fn new() -> Self {
        Self {
            pages: vec![PageLayout::default()],
            y: MARGIN_MM,
        }
    }

    fn push(&mut self, op: DrawOp) {
        if let Some(page) = self.pages.last_mut() {
            page.ops.push(op);
        }
    }

    fn text(&mut self, text: impl Into<String>, x: f32, size: f32, bold: bool) {
        self.text_at(text, x, self.y, size, bold, RgbColor::BLACK);
    }

    fn text_at(&mut self, text: impl Into<String>, x: f32, y: f32, size: f32, bold: bool, color: RgbColor) {
        self.push(DrawOp::Text {
            text: text.into(),
            x,
            y,
            size,
            bold,
            color,
        });
    }

    fn rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: RgbColor) {
        self.push(DrawOp::FilledRect {
            x,
            y,
            width,
            height,
            color,
        });
    }

    fn field(&mut self, label: &str, value: impl Into<String>, size: f32) {
        self.text(label, MARGIN_MM, size, true);
        self.text(value, VALUE_COLUMN, size, false);
    }

    fn break_if_past(&mut self, limit: f32) {
        if self.y > limit {
            self.pages.push(PageLayout::default());
            self.y = MARGIN_MM;
        }
    }

    fn finish(mut self) -> ReportLayout {
        let size = 8.0;
        let x = (PAGE_WIDTH_MM - estimated_width_mm(FOOTER_TEXT, size)) / 2.0;
        for page in &mut self.pages {
            page.ops.push(DrawOp::Text {
                text: FOOTER_TEXT.to_string(),
                x,
                y: PAGE_HEIGHT_MM - 10.0,
                size,
                bold: false,
                color: RgbColor::FOOTER_GRAY,
            });
        }
        ReportLayout { pages: self.pages }
    }
}

/// Rough Helvetica advance: half an em per character.
fn estimated_width_mm(text: &str, size_pt: f32) -> f32 {
    const MM_PER_PT: f32 = 25.4 / 72.0;
    text.chars().count() as f32 * size_pt * 0.5 * MM_PER_PT
}

/// Lay out the full report. Pure: the same inputs give the same pages.
pub fn build_layout(
    scan: &ScanResult,
    patient: &PatientInfo,
    generated_at: DateTime<Utc>,
) -> ReportLayout {
    let mut c = Cursor::new();

    header(&mut c);
    patient_block(&mut c, scan, patient);
    results_block(&mut c, scan);
    findings_block(&mut c, &scan.results.detections);
    metadata_block(&mut c, scan, generated_at);
    disclaimer_block(&mut c);

    c.finish()
}

fn header(c: &mut Cursor) {
    c.rect(0.0, 0.0, PAGE_WIDTH_MM, 40.0, RgbColor::INDIGO);
    c.text_at("PneumAI", MARGIN_MM, 20.0, 24.0, true, RgbColor::WHITE);
    c.text_at("CT Scan Analysis Report", MARGIN_MM, 30.0, 12.0, false, RgbColor::WHITE);
    c.y = 50.0;
}

fn patient_block(c: &mut Cursor, scan: &ScanResult, patient: &PatientInfo) {
    c.text("Patient Information", MARGIN_MM, 16.0, true);
    c.y += 10.0;

    let or_na = |v: Option<String>| v.unwrap_or_else(|| "N/A".to_string());
    let fields = [
        ("Patient Name:", or_na(patient.name.clone())),
        ("Patient ID:", or_na(patient.id.clone())),
        ("Age:", or_na(patient.age.map(|a| a.to_string()))),
        ("Scan Date:", format_scan_date(&scan.upload_time)),
        ("Scan ID:", scan.scan_id.clone()),
    ];
    for (label, value) in fields {
        c.field(label, value, 10.0);
        c.y += 7.0;
    }
    c.y += 5.0;
}

fn results_block(c: &mut Cursor, scan: &ScanResult) {
    let results = &scan.results;

    c.text("Analysis Results", MARGIN_MM, 16.0, true);
    c.y += 10.0;

    let banner = risk_color(&results.risk_level);
    c.rect(MARGIN_MM, c.y - 5.0, PAGE_WIDTH_MM - 2.0 * MARGIN_MM, 20.0, banner);
    c.text_at(
        format!("Risk Level: {}", risk_label(&results.risk_level).to_uppercase()),
        MARGIN_MM + 5.0,
        c.y + 5.0,
        14.0,
        true,
        RgbColor::WHITE,
    );
    c.y += 25.0;

    let status = if results.detected {
        "Potential abnormality detected"
    } else {
        "No significant abnormalities detected"
    };
    c.field("Detection Status:", status, 12.0);
    c.y += 10.0;

    c.field("Confidence Score:", percent(results.confidence), 12.0);
    c.y += 10.0;

    if let Some(top_class) = &results.top_class {
        c.field("Classification:", format_class_name(top_class), 12.0);
        c.y += 15.0;
    }
}

fn findings_block(c: &mut Cursor, detections: &[Detection]) {
    if detections.is_empty() {
        return;
    }

    c.text("Detailed Findings", MARGIN_MM, 14.0, true);
    c.y += 10.0;

    let indent = MARGIN_MM + 10.0;
    for (i, detection) in detections.iter().enumerate() {
        c.break_if_past(FINDINGS_BREAK_Y);

        c.text(format!("Finding {}:", i + 1), MARGIN_MM, 10.0, true);
        c.y += 7.0;

        let b = &detection.bounding_box;
        let mut lines = vec![
            format!("Class: {}", format_class_name(&detection.class)),
            format!("Confidence: {}", percent(detection.confidence)),
            format!(
                "Location: X={}, Y={} ({} x {})",
                b.x.round(),
                b.y.round(),
                b.width.round(),
                b.height.round()
            ),
        ];
        if let Some(ch) = &detection.characteristics {
            if let Some(size) = ch.size_mm {
                lines.push(format!("Size: {size} mm"));
            }
            if let Some(shape) = &ch.shape {
                lines.push(format!("Shape: {shape}"));
            }
            if let Some(density) = &ch.density {
                lines.push(format!("Density: {density}"));
            }
        }
        for line in lines {
            c.text(line, indent, 10.0, false);
            c.y += 6.0;
        }
        c.y += 5.0;
    }
}

fn metadata_block(c: &mut Cursor, scan: &ScanResult, generated_at: DateTime<Utc>) {
    c.y += 5.0;
    c.break_if_past(FINDINGS_BREAK_Y);

    c.text("Scan Metadata", MARGIN_MM, 14.0, true);
    c.y += 10.0;

    let mut lines = Vec::new();
    if let Some(size) = scan.image_size() {
        lines.push(format!("Image Size: {} x {}", size.width, size.height));
    }
    if let Some(meta) = &scan.metadata {
        if let Some(bytes) = meta.file_size {
            lines.push(format!("File Size: {:.2} MB", bytes as f64 / 1024.0 / 1024.0));
        }
        if let Some(format) = &meta.format {
            lines.push(format!("Format: {format}"));
        }
    }
    lines.push(match scan.processing_time {
        Some(seconds) => format!("Processing Time: {seconds}s"),
        None => "Processing Time: N/A".to_string(),
    });
    lines.push(format!(
        "Report Generated: {}",
        generated_at.format("%b %-d, %Y %I:%M %p")
    ));

    for line in lines {
        c.text(line, MARGIN_MM, 10.0, false);
        c.y += 7.0;
    }
    c.y += 8.0;
}

fn disclaimer_block(c: &mut Cursor) {
    c.break_if_past(DISCLAIMER_BREAK_Y);

    c.rect(
        MARGIN_MM,
        c.y - 5.0,
        PAGE_WIDTH_MM - 2.0 * MARGIN_MM,
        DISCLAIMER_BOX_HEIGHT,
        RgbColor::DISCLAIMER_YELLOW,
    );
    c.text_at(DISCLAIMER_TITLE, MARGIN_MM + 5.0, c.y + 5.0, 10.0, true, RgbColor::BLACK);
    c.y += 10.0;

    for line in DISCLAIMER_LINES {
        c.text(line, MARGIN_MM + 5.0, 9.0, false);
        c.y += 5.0;
    }
}
