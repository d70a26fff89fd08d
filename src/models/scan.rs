use serde::{Deserialize, Serialize};

/// Coarse severity assigned by the analysis service.
///
/// The confidence → risk mapping lives server-side; unknown values are kept
/// verbatim so they survive a round trip into exported reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RiskLevel {
    None,
    Low,
    Medium,
    High,
    Unrecognized(String),
}

impl RiskLevel {
    pub fn as_str(&self) -> &str {
        match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Unrecognized(raw) => raw,
        }
    }
}

impl From<String> for RiskLevel {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "none" => Self::None,
            "low" => Self::Low,
            "medium" => Self::Medium,
            "high" => Self::High,
            _ => Self::Unrecognized(raw),
        }
    }
}

impl From<RiskLevel> for String {
    fn from(level: RiskLevel) -> Self {
        match level {
            RiskLevel::Unrecognized(raw) => raw,
            other => other.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

/// Pixel-space box around a finding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Characteristics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_mm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub density: Option<String>,
}

/// One localized finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub class: String,
    pub confidence: f64,
    pub bounding_box: BoundingBox,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub characteristics: Option<Characteristics>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResults {
    pub detected: bool,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_class: Option<String>,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub detections: Vec<Detection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_size: Option<ImageSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotated_image_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_size: Option<ImageSize>,
    /// Bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// Normalized outcome of one analysis call. Created once, never mutated by
/// consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub scan_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub upload_time: String,
    /// Seconds spent server-side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<f64>,
    pub results: AnalysisResults,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ScanMetadata>,
}

impl ScanResult {
    /// Check the invariants a well-formed analysis response must hold.
    /// Returns a description of the first violation.
    pub fn validate(&self) -> Result<(), String> {
        if self.scan_id.trim().is_empty() {
            return Err("scanId is empty".into());
        }
        if !is_unit_interval(self.results.confidence) {
            return Err(format!(
                "confidence {} is outside [0, 1]",
                self.results.confidence
            ));
        }
        for (i, detection) in self.results.detections.iter().enumerate() {
            if !is_unit_interval(detection.confidence) {
                return Err(format!(
                    "detection {i} confidence {} is outside [0, 1]",
                    detection.confidence
                ));
            }
            let b = &detection.bounding_box;
            if !(b.x >= 0.0 && b.y >= 0.0) {
                return Err(format!("detection {i} bounding box has a negative origin"));
            }
            if !(b.width > 0.0 && b.height > 0.0) {
                return Err(format!("detection {i} bounding box has no area"));
            }
        }
        Ok(())
    }

    /// Image dimensions from the metadata block, falling back to the ones
    /// reported alongside the results.
    pub fn image_size(&self) -> Option<ImageSize> {
        self.metadata
            .as_ref()
            .and_then(|m| m.image_size)
            .or(self.results.image_size)
    }
}

fn is_unit_interval(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{
            "scanId": "SCAN-001",
            "status": "completed",
            "uploadTime": "2026-03-04T10:15:00.000Z",
            "processingTime": 1.25,
            "results": {
                "detected": true,
                "confidence": 0.91,
                "topClass": "nodule",
                "riskLevel": "high",
                "detections": [{
                    "class": "nodule",
                    "confidence": 0.91,
                    "boundingBox": {"x": 10, "y": 20, "width": 30, "height": 40},
                    "characteristics": {"size_mm": 17.5, "shape": "oval", "density": "solid"}
                }],
                "imageSize": {"width": 512, "height": 512},
                "imageUrl": "/api/v1/scan/SCAN-001/image"
            }
        }"#
    }

    #[test]
    fn deserializes_backend_shape() {
        let scan: ScanResult = serde_json::from_str(sample_json()).unwrap();
        assert_eq!(scan.scan_id, "SCAN-001");
        assert_eq!(scan.results.risk_level, RiskLevel::High);
        assert_eq!(scan.results.detections.len(), 1);
        let d = &scan.results.detections[0];
        assert_eq!(d.class, "nodule");
        assert_eq!(d.bounding_box.width, 30.0);
        assert_eq!(d.characteristics.as_ref().unwrap().size_mm, Some(17.5));
        assert!(scan.validate().is_ok());
    }

    #[test]
    fn unknown_risk_level_round_trips() {
        let level: RiskLevel = serde_json::from_str("\"critical\"").unwrap();
        assert_eq!(level, RiskLevel::Unrecognized("critical".into()));
        assert_eq!(serde_json::to_string(&level).unwrap(), "\"critical\"");
        assert_eq!(serde_json::to_string(&RiskLevel::Medium).unwrap(), "\"medium\"");
    }

    #[test]
    fn serializes_camel_case_without_absent_fields() {
        let scan: ScanResult = serde_json::from_str(sample_json()).unwrap();
        let value = serde_json::to_value(&scan).unwrap();
        assert_eq!(value["results"]["topClass"], "nodule");
        assert!(value.get("metadata").is_none());
        assert!(value["results"].get("annotatedImageUrl").is_none());
    }

    #[test]
    fn validate_rejects_out_of_range_confidence() {
        let mut scan: ScanResult = serde_json::from_str(sample_json()).unwrap();
        scan.results.confidence = 1.5;
        assert!(scan.validate().unwrap_err().contains("outside [0, 1]"));

        scan.results.confidence = f64::NAN;
        assert!(scan.validate().is_err());
    }

    #[test]
    fn validate_rejects_degenerate_boxes() {
        let mut scan: ScanResult = serde_json::from_str(sample_json()).unwrap();
        scan.results.detections[0].bounding_box.width = 0.0;
        assert!(scan.validate().unwrap_err().contains("no area"));

        let mut scan: ScanResult = serde_json::from_str(sample_json()).unwrap();
        scan.results.detections[0].bounding_box.x = -1.0;
        assert!(scan.validate().unwrap_err().contains("negative origin"));
    }

    #[test]
    fn validate_rejects_blank_scan_id() {
        let mut scan: ScanResult = serde_json::from_str(sample_json()).unwrap();
        scan.scan_id = "  ".into();
        assert!(scan.validate().is_err());
    }

    #[test]
    fn image_size_prefers_metadata() {
        let mut scan: ScanResult = serde_json::from_str(sample_json()).unwrap();
        assert_eq!(scan.image_size(), Some(ImageSize { width: 512, height: 512 }));

        scan.metadata = Some(ScanMetadata {
            image_size: Some(ImageSize { width: 1024, height: 768 }),
            ..Default::default()
        });
        assert_eq!(scan.image_size(), Some(ImageSize { width: 1024, height: 768 }));
    }
}
