use reqwest::{StatusCode, Url};
use tracing::{debug, info};

use super::types::{DuplicateRecord, PresignRequest, PresignedUpload, SignedUrlResponse};
use super::TransportError;
use crate::config::{self, ClientConfig};
use crate::pipeline::hash::ContentHash;

/// HTTP client for the storage API and for direct presigned uploads.
#[derive(Debug, Clone)]
pub struct StorageClient {
    pub(crate) base_url: String,
    pub(crate) bucket: String,
    pub(crate) client: reqwest::Client,
}

impl StorageClient {
    pub fn new(base_url: &str, bucket: &str) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config::CONNECT_TIMEOUT)
            .build()
            .map_err(|e| TransportError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: config::trim_base(base_url),
            bucket: bucket.to_string(),
            client,
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, TransportError> {
        Self::new(&config.storage_api_url, &config.bucket)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Ask the storage API for a presigned PUT destination.
    pub async fn presign(
        &self,
        file_name: &str,
        file_type: &str,
        file_hash: &ContentHash,
    ) -> Result<PresignedUpload, TransportError> {
        let url = format!("{}/api/v1/storage/presigned-url", self.base_url);
        let body = PresignRequest {
            file_name,
            file_type,
            file_hash,
            bucket: &self.bucket,
        };

        debug!(file = %file_name, "Requesting presigned upload URL");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(TransportError::from_reqwest)?;

        let response = ensure_success(response).await?;
        response
            .json::<PresignedUpload>()
            .await
            .map_err(|e| TransportError::MalformedResponse(e.to_string()))
    }

    /// Look up a stored scan with the same content hash.
    /// `Ok(None)` means the service answered 404 (no duplicate).
    pub async fn check_duplicate(
        &self,
        file_hash: &ContentHash,
    ) -> Result<Option<DuplicateRecord>, TransportError> {
        let url = format!(
            "{}/api/v1/storage/check-duplicate/{}",
            self.base_url,
            file_hash.as_str()
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(TransportError::from_reqwest)?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(hash = %file_hash, "No duplicate found");
            return Ok(None);
        }

        let response = ensure_success(response).await?;
        let record = response
            .json::<DuplicateRecord>()
            .await
            .map_err(|e| TransportError::MalformedResponse(e.to_string()))?;

        info!(hash = %file_hash, scan_id = ?record.scan_id, "Duplicate scan found");
        Ok(Some(record))
    }

    /// Short-lived GET URL for a stored object.
    pub async fn signed_url(&self, key: &str) -> Result<String, TransportError> {
        let mut url = Url::parse(&format!("{}/api/v1/storage/signed-url", self.base_url))
            .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| TransportError::InvalidUrl(self.base_url.clone()))?
            .push(key);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(TransportError::from_reqwest)?;

        let response = ensure_success(response).await?;
        let parsed = response
            .json::<SignedUrlResponse>()
            .await
            .map_err(|e| TransportError::MalformedResponse(e.to_string()))?;
        Ok(parsed.signed_url)
    }
}

/// Turn a non-2xx response into `TransportError::Status`, keeping the body.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(TransportError::Status {
        status: status.as_u16(),
        body,
    })
}
