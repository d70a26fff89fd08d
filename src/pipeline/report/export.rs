//! Report file naming, saving and loading of stored results.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::info;

use super::ReportError;
use crate::models::ScanResult;

/// `PneumAI_Report_{scanId}_{YYYY-MM-DD}.{ext}`. Path separators in the id
/// are dropped so the name always stays inside the export directory.
pub fn report_filename(scan_id: &str, date: NaiveDate, ext: &str) -> String {
    let id: String = scan_id
        .chars()
        .filter(|c| !matches!(c, '/' | '\\') && !c.is_control())
        .collect();
    let id = match id.trim_matches('.') {
        "" => "scan",
        trimmed => trimmed,
    };
    format!("PneumAI_Report_{id}_{}.{ext}", date.format("%Y-%m-%d"))
}

/// Write a finished report into `dir`, creating it if needed.
pub fn export_report(bytes: &[u8], filename: &str, dir: &Path) -> Result<PathBuf, ReportError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(filename);
    std::fs::write(&path, bytes)?;
    info!(path = %path.display(), bytes = bytes.len(), "Report exported");
    Ok(path)
}

/// Parse a previously stored analysis result. A record without `results`
/// cannot be reported on.
pub fn load_scan_result(json: &str) -> Result<ScanResult, ReportError> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    if value.get("results").map_or(true, serde_json::Value::is_null) {
        return Err(ReportError::Render(
            "stored scan has no analysis results".into(),
        ));
    }
    Ok(serde_json::from_value(value)?)
}
