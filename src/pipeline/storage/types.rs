use serde::{Deserialize, Serialize};

use crate::pipeline::hash::ContentHash;

/// Body of `POST /api/v1/storage/presigned-url`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignRequest<'a> {
    pub file_name: &'a str,
    pub file_type: &'a str,
    pub file_hash: &'a ContentHash,
    pub bucket: &'a str,
}

/// Time-limited destinations for one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUpload {
    /// PUT target.
    pub upload_url: String,
    /// GET URL for reading the object back.
    pub access_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

/// Metadata of a previously stored scan with the same content hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateRecord {
    #[serde(default = "default_exists")]
    pub exists: bool,
    #[serde(default)]
    pub scan_id: Option<String>,
    #[serde(default)]
    pub upload_time: Option<String>,
    #[serde(default)]
    pub original_key: Option<String>,
    #[serde(default)]
    pub thumbnail_key: Option<String>,
}

fn default_exists() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SignedUrlResponse {
    pub signed_url: String,
}

/// Everything known about a completed original + thumbnail upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub file_hash: ContentHash,
    pub original_key: String,
    pub thumbnail_key: String,
    pub original_url: String,
    pub thumbnail_url: String,
    pub file_name: String,
    pub file_size: u64,
    pub file_type: String,
    pub upload_time: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    Uploaded(UploadReceipt),
    /// Same bytes already stored; nothing was transferred.
    Duplicate {
        file_hash: ContentHash,
        existing: DuplicateRecord,
    },
}
