use serde::{Deserialize, Serialize};

use super::scan::RiskLevel;

/// Per-slice outcome inside a batch analysis. Failed slices carry `error`
/// and no scan id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSliceResult {
    #[serde(default)]
    pub scan_id: Option<String>,
    pub slice_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchSliceResult {
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallAssessment {
    pub max_confidence: f64,
    pub risk_level: RiskLevel,
    pub detected_slices: u32,
    pub total_slices: u32,
}

/// Aggregated response of a batch analysis request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchAnalysis {
    pub batch_id: String,
    pub total_scans: u32,
    pub completed_scans: u32,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub results: Vec<BatchSliceResult>,
    pub overall_assessment: OverallAssessment,
}

/// Confidence cut-offs the service recommends for each risk band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionThresholds {
    pub high_risk: f64,
    pub medium_risk: f64,
    pub low_risk: f64,
}

impl Default for DetectionThresholds {
    fn default() -> Self {
        Self {
            high_risk: 0.8,
            medium_risk: 0.5,
            low_risk: 0.3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_batch_with_failed_slice() {
        let json = r#"{
            "batchId": "batch_0123456789ab",
            "totalScans": 2,
            "completedScans": 2,
            "status": "completed",
            "results": [
                {"scanId": "SCAN-1", "sliceNumber": 1, "detected": true, "confidence": 0.8, "riskLevel": "high"},
                {"scanId": null, "sliceNumber": 2, "error": "cannot decode"}
            ],
            "overallAssessment": {"maxConfidence": 0.8, "riskLevel": "high", "detectedSlices": 1, "totalSlices": 2}
        }"#;
        let batch: BatchAnalysis = serde_json::from_str(json).unwrap();
        assert_eq!(batch.results.len(), 2);
        assert!(!batch.results[0].is_failed());
        assert!(batch.results[1].is_failed());
        assert_eq!(batch.results[1].scan_id, None);
        assert_eq!(batch.overall_assessment.risk_level, RiskLevel::High);
    }

    #[test]
    fn default_thresholds() {
        let t = DetectionThresholds::default();
        assert_eq!((t.high_risk, t.medium_risk, t.low_risk), (0.8, 0.5, 0.3));
    }
}
