pub mod client;
pub mod normalize;
pub mod types;

pub use client::*;
pub use normalize::*;
pub use types::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Invalid analysis request: {0}")]
    Precondition(String),

    #[error("{message} (status {status})")]
    Request { status: u16, message: String },

    #[error("Malformed analysis response: {0}")]
    MalformedResponse(String),

    #[error("Network error contacting analysis service: {0}")]
    Network(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

impl AnalysisError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::MalformedResponse(e.to_string())
        } else if e.is_builder() {
            Self::HttpClient(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}
