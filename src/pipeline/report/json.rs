use serde::{Deserialize, Serialize};

use crate::models::{PatientInfo, RiskLevel, ScanResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub detected: bool,
    pub risk_level: RiskLevel,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,
}

/// Structured export of one analysed scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonReport {
    pub report_generated_at: String,
    pub patient: PatientInfo,
    pub scan: ScanResult,
    pub summary: ReportSummary,
}

impl JsonReport {
    pub fn new(scan: &ScanResult, patient: &PatientInfo, report_generated_at: String) -> Self {
        let results = &scan.results;
        Self {
            report_generated_at,
            patient: patient.clone(),
            scan: scan.clone(),
            summary: ReportSummary {
                detected: results.detected,
                risk_level: results.risk_level.clone(),
                confidence: results.confidence,
                classification: results.top_class.clone(),
            },
        }
    }
}
