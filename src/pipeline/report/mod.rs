pub mod export;
pub mod json;
pub mod layout;
pub mod pdf;

pub use export::*;
pub use json::*;
pub use layout::{build_layout, ReportLayout};
pub use pdf::render_pdf;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;

use crate::models::{PatientInfo, ScanResult};
use crate::pipeline::analysis::format_timestamp;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Cannot render report: {0}")]
    Render(String),

    #[error("Report export failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Report serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Produces PDF and JSON reports for one generation instant. The timestamp
/// is injected so output is reproducible.
#[derive(Debug, Clone, Copy)]
pub struct ReportGenerator {
    generated_at: DateTime<Utc>,
}

impl ReportGenerator {
    pub fn new(generated_at: DateTime<Utc>) -> Self {
        Self { generated_at }
    }

    pub fn now() -> Self {
        Self::new(Utc::now())
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    pub fn layout(
        &self,
        scan: &ScanResult,
        patient: &PatientInfo,
    ) -> Result<ReportLayout, ReportError> {
        check_renderable(scan)?;
        Ok(build_layout(scan, patient, self.generated_at))
    }

    pub fn render_pdf(&self, scan: &ScanResult, patient: &PatientInfo) -> Result<Vec<u8>, ReportError> {
        let layout = self.layout(scan, patient)?;
        debug!(scan_id = %scan.scan_id, pages = layout.page_count(), "Rendering PDF report");
        render_pdf(
            &layout,
            &format!("PneumAI Report {}", scan.scan_id),
            self.generated_at,
        )
    }

    pub fn json_report(
        &self,
        scan: &ScanResult,
        patient: &PatientInfo,
    ) -> Result<JsonReport, ReportError> {
        check_renderable(scan)?;
        Ok(JsonReport::new(scan, patient, format_timestamp(self.generated_at)))
    }

    /// Pretty-printed JSON report.
    pub fn render_json(&self, scan: &ScanResult, patient: &PatientInfo) -> Result<Vec<u8>, ReportError> {
        let report = self.json_report(scan, patient)?;
        Ok(serde_json::to_vec_pretty(&report)?)
    }

    /// Download name for this scan's report, dated by generation time.
    pub fn filename(&self, scan: &ScanResult, ext: &str) -> String {
        report_filename(&scan.scan_id, self.generated_at.date_naive(), ext)
    }
}

fn check_renderable(scan: &ScanResult) -> Result<(), ReportError> {
    if scan.scan_id.trim().is_empty() {
        return Err(ReportError::Render("scan id is empty".into()));
    }
    if !scan.results.confidence.is_finite() {
        return Err(ReportError::Render(format!(
            "confidence {} is not a number",
            scan.results.confidence
        )));
    }
    Ok(())
}
