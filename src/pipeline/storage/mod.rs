pub mod client;
pub mod transport;
pub mod types;
pub mod workflow;

pub use client::*;
pub use types::*;
pub use workflow::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Network error during upload: {0}")]
    Network(String),

    #[error("Upload failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Upload cancelled")]
    Aborted,

    #[error("Invalid destination URL: {0}")]
    InvalidUrl(String),

    #[error("Malformed storage response: {0}")]
    MalformedResponse(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

impl TransportError {
    /// Connectivity failures are the only ones worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::MalformedResponse(e.to_string())
        } else if e.is_builder() {
            Self::InvalidUrl(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}
