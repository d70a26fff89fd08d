//! Complete scan upload: hash → duplicate check → thumbnail → presign →
//! original upload → thumbnail upload.
//!
//! Overall progress: 10 hashing, 20 thumbnail, 30 presigned, 30-70 original
//! bytes, 70-100 thumbnail bytes.

use chrono::{SecondsFormat, Utc};
use tracing::info;

use super::client::StorageClient;
use super::types::{UploadOutcome, UploadReceipt};
use super::TransportError;
use crate::models::ScanFile;
use crate::pipeline::hash::hash_bytes;
use crate::pipeline::progress::{AbortHandle, ProgressReporter};
use crate::pipeline::thumbnail::{generate_thumbnail, ThumbnailOptions, THUMBNAIL_MIME_TYPE};
use crate::pipeline::PipelineError;

pub struct UploadPipeline {
    storage: StorageClient,
    thumbnail: ThumbnailOptions,
    skip_duplicates: bool,
}

impl UploadPipeline {
    pub fn new(storage: StorageClient) -> Self {
        Self {
            storage,
            thumbnail: ThumbnailOptions::default(),
            skip_duplicates: true,
        }
    }

    pub fn with_thumbnail_options(mut self, options: ThumbnailOptions) -> Self {
        self.thumbnail = options;
        self
    }

    /// Upload even when the storage API already knows these bytes.
    pub fn always_upload(mut self) -> Self {
        self.skip_duplicates = false;
        self
    }

    pub async fn upload_scan(
        &self,
        file: &ScanFile,
        reporter: &ProgressReporter,
        abort: &AbortHandle,
    ) -> Result<UploadOutcome, PipelineError> {
        info!(file = %file.file_name, bytes = file.len(), "Starting scan upload");
        abort.attach(reporter);

        reporter.report_percent(10);
        let file_hash = hash_bytes(&file.bytes);
        ensure_not_aborted(abort)?;

        if self.skip_duplicates {
            if let Some(existing) = self.storage.check_duplicate(&file_hash).await? {
                info!(file = %file.file_name, hash = %file_hash, "Skipping upload of duplicate scan");
                return Ok(UploadOutcome::Duplicate {
                    file_hash,
                    existing,
                });
            }
            ensure_not_aborted(abort)?;
        }

        reporter.report_percent(20);
        let thumbnail = generate_thumbnail(&file.bytes, &self.thumbnail)?;
        let thumbnail_file = ScanFile::new(
            format!("thumb_{}", file.file_name),
            THUMBNAIL_MIME_TYPE,
            thumbnail.bytes,
        );

        reporter.report_percent(30);
        let (original_target, thumbnail_target) = tokio::try_join!(
            self.storage.presign(&file.file_name, &file.mime_type, &file_hash),
            self.storage.presign(&thumbnail_file.file_name, THUMBNAIL_MIME_TYPE, &file_hash),
        )?;
        ensure_not_aborted(abort)?;

        let original_key = self
            .storage
            .upload(&original_target.upload_url, file, &reporter.scaled(30, 70), abort)
            .await?;
        let thumbnail_key = self
            .storage
            .upload(
                &thumbnail_target.upload_url,
                &thumbnail_file,
                &reporter.scaled(70, 100),
                abort,
            )
            .await?;

        reporter.report_percent(100);

        Ok(UploadOutcome::Uploaded(UploadReceipt {
            file_hash,
            original_key,
            thumbnail_key,
            original_url: original_target.access_url,
            thumbnail_url: thumbnail_target.access_url,
            file_name: file.file_name.clone(),
            file_size: file.len() as u64,
            file_type: file.mime_type.clone(),
            upload_time: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }))
    }
}

fn ensure_not_aborted(abort: &AbortHandle) -> Result<(), TransportError> {
    if abort.is_aborted() {
        Err(TransportError::Aborted)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::hash::ContentHash;
    use crate::test_support::{png_bytes, serve};
    use axum::body::Bytes;
    use axum::extract::{Path, State};
    use axum::http::{header::HOST, HeaderMap, StatusCode};
    use axum::routing::{get, post, put};
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct FakeStorage {
        objects: Arc<Mutex<HashMap<String, (String, usize)>>>,
        duplicate: Option<Value>,
    }

    fn storage_router(state: FakeStorage) -> Router {
        Router::new()
            .route(
                "/api/v1/storage/presigned-url",
                post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                    let host = headers.get(HOST).unwrap().to_str().unwrap().to_string();
                    let name = body["fileName"].as_str().unwrap().to_string();
                    Json(json!({
                        "uploadUrl": format!("http://{host}/s3/{name}?sig=1"),
                        "accessUrl": format!("http://{host}/s3/{name}?get=1"),
                    }))
                }),
            )
            .route(
                "/api/v1/storage/check-duplicate/:hash",
                get(|State(state): State<FakeStorage>| async move {
                    match state.duplicate {
                        Some(record) => (StatusCode::OK, Json(record)),
                        None => (StatusCode::NOT_FOUND, Json(json!({"detail": "No duplicate found"}))),
                    }
                }),
            )
            .route(
                "/s3/:name",
                put(
                    |State(state): State<FakeStorage>,
                     Path(name): Path<String>,
                     headers: HeaderMap,
                     body: Bytes| async move {
                        let content_type = headers
                            .get("content-type")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or_default()
                            .to_string();
                        state
                            .objects
                            .lock()
                            .unwrap()
                            .insert(name, (content_type, body.len()));
                        StatusCode::OK
                    },
                ),
            )
            .with_state(state)
    }

    fn recording() -> (ProgressReporter, Arc<Mutex<Vec<u8>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (ProgressReporter::new(move |p| sink.lock().unwrap().push(p)), seen)
    }

    #[tokio::test]
    async fn uploads_original_and_thumbnail() {
        let state = FakeStorage::default();
        let base = serve(storage_router(state.clone())).await;
        let pipeline = UploadPipeline::new(StorageClient::new(&base, "pneumai-scans").unwrap());
        let file = ScanFile::new("ct.png", "image/png", png_bytes(800, 600));
        let (reporter, seen) = recording();

        let outcome = pipeline
            .upload_scan(&file, &reporter, &AbortHandle::linked(&reporter))
            .await
            .unwrap();

        let receipt = match outcome {
            UploadOutcome::Uploaded(receipt) => receipt,
            other => panic!("expected upload, got {other:?}"),
        };
        assert_eq!(receipt.original_key, "s3/ct.png");
        assert_eq!(receipt.thumbnail_key, "s3/thumb_ct.png");
        assert_eq!(receipt.file_hash, hash_bytes(&file.bytes));
        assert_eq!(receipt.file_size, file.len() as u64);
        assert!(receipt.original_url.ends_with("/s3/ct.png?get=1"));

        let objects = state.objects.lock().unwrap();
        assert_eq!(objects["ct.png"], ("image/png".to_string(), file.len()));
        assert_eq!(objects["thumb_ct.png"].0, "image/jpeg");

        let progress = seen.lock().unwrap().clone();
        assert_eq!(&progress[..3], &[10, 20, 30]);
        assert!(progress.windows(2).all(|w| w[0] < w[1]), "{progress:?}");
        assert_eq!(progress.last(), Some(&100));
    }

    #[tokio::test]
    async fn duplicate_short_circuits_upload() {
        let state = FakeStorage {
            duplicate: Some(json!({"exists": true, "scanId": "SCAN-7", "originalKey": "scans/x/ct.png"})),
            ..Default::default()
        };
        let base = serve(storage_router(state.clone())).await;
        let pipeline = UploadPipeline::new(StorageClient::new(&base, "b").unwrap());
        let file = ScanFile::new("ct.png", "image/png", png_bytes(32, 32));

        let outcome = pipeline
            .upload_scan(&file, &ProgressReporter::silent(), &AbortHandle::new())
            .await
            .unwrap();

        match outcome {
            UploadOutcome::Duplicate { file_hash, existing } => {
                assert_eq!(file_hash, hash_bytes(&file.bytes));
                assert_eq!(existing.scan_id.as_deref(), Some("SCAN-7"));
            }
            other => panic!("expected duplicate, got {other:?}"),
        }
        assert!(state.objects.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn always_upload_ignores_duplicates() {
        let state = FakeStorage {
            duplicate: Some(json!({"exists": true})),
            ..Default::default()
        };
        let base = serve(storage_router(state.clone())).await;
        let pipeline = UploadPipeline::new(StorageClient::new(&base, "b").unwrap()).always_upload();
        let file = ScanFile::new("ct.png", "image/png", png_bytes(32, 32));

        let outcome = pipeline
            .upload_scan(&file, &ProgressReporter::silent(), &AbortHandle::new())
            .await
            .unwrap();
        assert!(matches!(outcome, UploadOutcome::Uploaded(_)));
        assert_eq!(state.objects.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn undecodable_scan_fails_before_any_upload() {
        let state = FakeStorage::default();
        let base = serve(storage_router(state.clone())).await;
        let pipeline = UploadPipeline::new(StorageClient::new(&base, "b").unwrap());
        let file = ScanFile::new("ct.png", "image/png", b"not an image".to_vec());

        let err = pipeline
            .upload_scan(&file, &ProgressReporter::silent(), &AbortHandle::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Thumbnail(_)), "{err:?}");
        assert!(state.objects.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn aborted_handle_stops_pipeline() {
        let base = serve(storage_router(FakeStorage::default())).await;
        let pipeline = UploadPipeline::new(StorageClient::new(&base, "b").unwrap());
        let file = ScanFile::new("ct.png", "image/png", png_bytes(32, 32));
        let abort = AbortHandle::new();
        abort.abort();

        let err = pipeline
            .upload_scan(&file, &ProgressReporter::silent(), &abort)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Transport(TransportError::Aborted)));
    }

    #[test]
    fn receipt_serializes_camel_case() {
        let receipt = UploadReceipt {
            file_hash: hash_bytes(b"a"),
            original_key: "k".into(),
            thumbnail_key: "t".into(),
            original_url: "u".into(),
            thumbnail_url: "v".into(),
            file_name: "a.png".into(),
            file_size: 1,
            file_type: "image/png".into(),
            upload_time: "2026-01-01T00:00:00.000Z".into(),
        };
        let value = serde_json::to_value(&receipt).unwrap();
        let hash: ContentHash = serde_json::from_value(value["fileHash"].clone()).unwrap();
        assert_eq!(hash, receipt.file_hash);
        assert_eq!(value["thumbnailKey"], "t");
    }
}
