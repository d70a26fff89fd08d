//! Direct-to-storage PUT with byte-level progress and abort.

use futures_util::stream;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, Url};
use tracing::{debug, info, warn};

use super::client::{ensure_success, StorageClient};
use super::TransportError;
use crate::models::ScanFile;
use crate::pipeline::progress::{AbortHandle, ProgressReporter};

/// Bytes handed to the HTTP stack per progress step.
pub const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Wrap `data` in a streaming body that reports progress as each chunk is
/// handed to the connection.
pub(crate) fn progress_body(data: &[u8], reporter: ProgressReporter) -> Body {
    let total = data.len() as u64;
    let chunks: Vec<Vec<u8>> = data.chunks(UPLOAD_CHUNK_SIZE).map(<[u8]>::to_vec).collect();
    let mut sent = 0u64;

    let chunks = stream::iter(chunks.into_iter().map(move |chunk| {
        sent += chunk.len() as u64;
        reporter.report_bytes(sent, total);
        Ok::<_, std::io::Error>(chunk)
    }));
    Body::wrap_stream(chunks)
}

/// Object key addressed by a presigned URL: its path without the leading
/// slash.
pub fn storage_key(presigned_url: &str) -> Result<String, TransportError> {
    let url = Url::parse(presigned_url)
        .map_err(|e| TransportError::InvalidUrl(format!("{presigned_url}: {e}")))?;
    Ok(url.path().trim_start_matches('/').to_string())
}

impl StorageClient {
    /// PUT `file` to a presigned destination and return its storage key.
    ///
    /// Progress goes to `reporter`, which is attached to `abort`: once
    /// `abort()` returns it reports nothing more, and the call resolves to
    /// `TransportError::Aborted`. Nothing is retried.
    pub async fn upload(
        &self,
        presigned_url: &str,
        file: &ScanFile,
        reporter: &ProgressReporter,
        abort: &AbortHandle,
    ) -> Result<String, TransportError> {
        let key = storage_key(presigned_url)?;

        abort.attach(reporter);
        if abort.is_aborted() {
            return Err(TransportError::Aborted);
        }

        debug!(file = %file.file_name, bytes = file.len(), "Starting presigned upload");

        let request = self
            .client
            .put(presigned_url)
            .header(CONTENT_TYPE, &file.mime_type)
            .header(CONTENT_LENGTH, file.len())
            .body(progress_body(&file.bytes, reporter.clone()));

        let transfer = async {
            let response = request.send().await.map_err(TransportError::from_reqwest)?;
            ensure_success(response).await
        };

        let outcome = tokio::select! {
            biased;
            () = abort.aborted() => Err(TransportError::Aborted),
            result = transfer => result,
        };

        match outcome {
            Ok(_) => {
                info!(file = %file.file_name, key = %key, "Upload complete");
                Ok(key)
            }
            Err(TransportError::Aborted) => {
                info!(file = %file.file_name, "Upload cancelled");
                Err(TransportError::Aborted)
            }
            Err(e) => {
                warn!(file = %file.file_name, error = %e, "Upload failed");
                Err(e)
            }
        }
    }
}
