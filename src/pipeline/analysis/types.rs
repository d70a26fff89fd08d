use serde::{Deserialize, Serialize};

use crate::models::RiskLevel;

/// One row of a patient's scan history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    pub scan_id: String,
    pub upload_time: String,
    #[serde(default)]
    pub status: Option<String>,
    pub risk_level: RiskLevel,
    pub confidence: f64,
    pub detected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientScans {
    pub patient_id: String,
    pub total_scans: u32,
    #[serde(default)]
    pub scans: Vec<ScanSummary>,
}

/// `GET /health` payload. Only `status` is guaranteed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub model_loaded: Option<bool>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status.eq_ignore_ascii_case("healthy")
    }
}

/// Error body shapes the service uses: `{message}` or FastAPI's `{detail}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl ErrorBody {
    pub(crate) fn into_message(self) -> Option<String> {
        if let Some(message) = self.message.filter(|m| !m.is_empty()) {
            return Some(message);
        }
        match self.detail? {
            serde_json::Value::String(s) => Some(s).filter(|s| !s.is_empty()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}
