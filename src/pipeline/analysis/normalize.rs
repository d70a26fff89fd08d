//! Absolute URLs for images served by the analysis service.

use crate::models::ScanResult;

fn is_absolute(url: &str) -> bool {
    let lower = url.get(..8).unwrap_or(url).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Prefix a relative `url` with `base`, joined by exactly one `/`.
/// Absolute and empty URLs come back unchanged, so applying this twice is
/// the same as applying it once.
pub fn normalize_url(base: &str, url: &str) -> String {
    if url.is_empty() || is_absolute(url) {
        return url.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        url.trim_start_matches('/')
    )
}

/// Rewrite the image URLs of `result` against `base`.
pub fn normalize_result(result: &mut ScanResult, base: &str) {
    let results = &mut result.results;
    for url in [&mut results.image_url, &mut results.annotated_image_url]
        .into_iter()
        .flatten()
    {
        *url = normalize_url(base, url);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnalysisResults, RiskLevel};

    #[test]
    fn relative_url_gets_base() {
        assert_eq!(
            normalize_url("http://host:8000", "/files/a.png"),
            "http://host:8000/files/a.png"
        );
        assert_eq!(
            normalize_url("http://host:8000/", "files/a.png"),
            "http://host:8000/files/a.png"
        );
    }

    #[test]
    fn absolute_url_unchanged() {
        for url in ["https://cdn.example.com/a.png", "http://x/y", "HTTPS://CDN/A.PNG"] {
            assert_eq!(normalize_url("http://host:8000", url), url);
        }
    }

    #[test]
    fn normalization_is_idempotent() {
        let base = "http://host:8000";
        for url in ["/files/a.png", "files/a.png", "https://cdn.example.com/a.png", ""] {
            let once = normalize_url(base, url);
            assert_eq!(normalize_url(base, &once), once);
        }
    }

    #[test]
    fn empty_url_left_alone() {
        assert_eq!(normalize_url("http://host:8000", ""), "");
    }

    #[test]
    fn rewrites_both_image_urls() {
        let mut result = ScanResult {
            scan_id: "SCAN-1".into(),
            status: None,
            upload_time: "2026-01-01T00:00:00Z".into(),
            processing_time: None,
            results: AnalysisResults {
                detected: false,
                confidence: 0.1,
                top_class: None,
                risk_level: RiskLevel::None,
                detections: vec![],
                image_size: None,
                image_url: Some("/api/v1/scan/SCAN-1/image".into()),
                annotated_image_url: Some("https://cdn.example.com/ann.png".into()),
            },
            metadata: None,
        };

        normalize_result(&mut result, "http://host:8000");

        assert_eq!(
            result.results.image_url.as_deref(),
            Some("http://host:8000/api/v1/scan/SCAN-1/image")
        );
        assert_eq!(
            result.results.annotated_image_url.as_deref(),
            Some("https://cdn.example.com/ann.png")
        );
    }
}
