use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::multipart::{Form, Part};
use reqwest::Url;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use super::normalize::normalize_result;
use super::types::{ErrorBody, HealthStatus, PatientScans};
use super::AnalysisError;
use crate::config::{self, ClientConfig};
use crate::models::{BatchAnalysis, DetectionThresholds, ScanFile, ScanResult};
use crate::pipeline::progress::ProgressReporter;
use crate::pipeline::storage::transport::progress_body;

/// Client for the remote inference service.
///
/// Only a connect timeout is configured: analysis can take arbitrarily long,
/// and callers wanting a deadline race the future against their own timer.
#[derive(Debug, Clone)]
pub struct AnalysisClient {
    base_url: String,
    client: reqwest::Client,
}

/// ISO-8601 with milliseconds and a `Z` suffix, as sent in `timestamp`.
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl AnalysisClient {
    pub fn new(base_url: &str) -> Result<Self, AnalysisError> {
        let base_url = config::trim_base(base_url);
        Url::parse(&base_url).map_err(|e| {
            AnalysisError::Precondition(format!("invalid analysis service URL {base_url}: {e}"))
        })?;

        let client = reqwest::Client::builder()
            .connect_timeout(config::CONNECT_TIMEOUT)
            .build()
            .map_err(|e| AnalysisError::HttpClient(e.to_string()))?;

        Ok(Self { base_url, client })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, AnalysisError> {
        Self::new(&config.api_base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Submit one scan for analysis.
    pub async fn analyze(
        &self,
        file: &ScanFile,
        timestamp: DateTime<Utc>,
    ) -> Result<ScanResult, AnalysisError> {
        self.submit_scan(file, timestamp, None).await
    }

    /// Like [`analyze`](Self::analyze), reporting upload progress of the scan
    /// bytes to `reporter`.
    pub async fn analyze_with_progress(
        &self,
        file: &ScanFile,
        timestamp: DateTime<Utc>,
        reporter: &ProgressReporter,
    ) -> Result<ScanResult, AnalysisError> {
        self.submit_scan(file, timestamp, Some(reporter)).await
    }

    async fn submit_scan(
        &self,
        file: &ScanFile,
        timestamp: DateTime<Utc>,
        reporter: Option<&ProgressReporter>,
    ) -> Result<ScanResult, AnalysisError> {
        ensure_uploadable(file)?;

        let body = match reporter {
            Some(reporter) => Part::stream_with_length(
                progress_body(&file.bytes, reporter.clone()),
                file.len() as u64,
            ),
            None => Part::bytes(file.bytes.clone()),
        };
        let form = Form::new()
            .part("scan", scan_part(body, file)?)
            .text("timestamp", format_timestamp(timestamp));

        let url = self.endpoint(&["api", "v1", "scan", "analyze"])?;
        info!(file = %file.file_name, bytes = file.len(), "Submitting scan for analysis");

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(AnalysisError::from_reqwest)?;

        let result = self.read_scan_result(response).await?;
        info!(
            scan_id = %result.scan_id,
            risk_level = %result.results.risk_level,
            detections = result.results.detections.len(),
            "Analysis complete"
        );
        Ok(result)
    }

    /// Submit an ordered set of slices as one batch request.
    pub async fn analyze_batch(
        &self,
        files: &[ScanFile],
        timestamp: DateTime<Utc>,
    ) -> Result<BatchAnalysis, AnalysisError> {
        if files.is_empty() {
            return Err(AnalysisError::Precondition("batch contains no scans".into()));
        }

        let mut form = Form::new();
        for file in files {
            ensure_uploadable(file)?;
            form = form.part("scans", scan_part(Part::bytes(file.bytes.clone()), file)?);
        }
        let form = form
            .text("timestamp", format_timestamp(timestamp))
            .text("batch", "true");

        let url = self.endpoint(&["api", "v1", "scan", "batch-analyze"])?;
        info!(scans = files.len(), "Submitting batch for analysis");

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(AnalysisError::from_reqwest)?;

        let batch: BatchAnalysis = read_json(response).await?;
        info!(
            batch_id = %batch.batch_id,
            completed = batch.completed_scans,
            total = batch.total_scans,
            risk_level = %batch.overall_assessment.risk_level,
            "Batch analysis complete"
        );
        Ok(batch)
    }

    /// Fetch a stored result by id.
    pub async fn scan_result(&self, scan_id: &str) -> Result<ScanResult, AnalysisError> {
        if scan_id.trim().is_empty() {
            return Err(AnalysisError::Precondition("scan id is empty".into()));
        }
        let response = self.get(&["api", "v1", "scan", scan_id]).await?;
        self.read_scan_result(response).await
    }

    pub async fn patient_scans(&self, patient_id: &str) -> Result<PatientScans, AnalysisError> {
        if patient_id.trim().is_empty() {
            return Err(AnalysisError::Precondition("patient id is empty".into()));
        }
        let response = self.get(&["api", "v1", "patient", patient_id, "scans"]).await?;
        read_json(response).await
    }

    /// Recommended confidence cut-offs. Failures propagate; callers that
    /// want a fallback use `DetectionThresholds::default()`.
    pub async fn detection_thresholds(&self) -> Result<DetectionThresholds, AnalysisError> {
        let response = self.get(&["api", "v1", "config", "thresholds"]).await?;
        read_json(response).await
    }

    pub async fn health(&self) -> Result<HealthStatus, AnalysisError> {
        let response = self.get(&["health"]).await?;
        let status: HealthStatus = read_json(response).await?;
        if !status.is_healthy() {
            warn!(status = %status.status, "Analysis service reports degraded health");
        }
        Ok(status)
    }

    async fn get(&self, segments: &[&str]) -> Result<reqwest::Response, AnalysisError> {
        let url = self.endpoint(segments)?;
        debug!(url = %url, "GET");
        self.client
            .get(url)
            .send()
            .await
            .map_err(AnalysisError::from_reqwest)
    }

    async fn read_scan_result(
        &self,
        response: reqwest::Response,
    ) -> Result<ScanResult, AnalysisError> {
        let mut result: ScanResult = read_json(response).await?;
        result
            .validate()
            .map_err(AnalysisError::MalformedResponse)?;
        normalize_result(&mut result, &self.base_url);
        Ok(result)
    }

    /// `{base}/{segments...}`, each segment percent-encoded on its own.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, AnalysisError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| AnalysisError::Precondition(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| AnalysisError::Precondition(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

fn ensure_uploadable(file: &ScanFile) -> Result<(), AnalysisError> {
    if file.is_empty() {
        return Err(AnalysisError::Precondition(format!(
            "{} is empty",
            file.file_name
        )));
    }
    Ok(())
}

fn scan_part(part: Part, file: &ScanFile) -> Result<Part, AnalysisError> {
    part.file_name(file.file_name.clone())
        .mime_str(&file.mime_type)
        .map_err(|e| {
            AnalysisError::Precondition(format!("invalid MIME type {:?}: {e}", file.mime_type))
        })
}

/// Check the status, then decode the body as `T`.
async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, AnalysisError> {
    let status = response.status();
    let text = response.text().await.map_err(AnalysisError::from_reqwest)?;

    if !status.is_success() {
        let message = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(ErrorBody::into_message)
            .unwrap_or_else(|| {
                format!("Analysis request failed with status {}", status.as_u16())
            });
        warn!(status = status.as_u16(), message = %message, "Analysis service rejected request");
        return Err(AnalysisError::Request {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_str(&text).map_err(|e| AnalysisError::MalformedResponse(e.to_string()))
}
