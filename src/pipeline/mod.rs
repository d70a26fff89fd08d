pub mod analysis;
pub mod hash;
pub mod progress;
pub mod report;
pub mod storage;
pub mod thumbnail;

use thiserror::Error;

use analysis::AnalysisError;
use hash::HashError;
use report::ReportError;
use storage::TransportError;
use thumbnail::ThumbnailError;

/// Any failure along the upload → analysis → report path.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Hashing error: {0}")]
    Hash(#[from] HashError),

    #[error("Thumbnail error: {0}")]
    Thumbnail(#[from] ThumbnailError),

    #[error("Storage error: {0}")]
    Transport(#[from] TransportError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),
}

impl PipelineError {
    /// The caller cancelled; not an application failure.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Transport(TransportError::Aborted))
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_retryable(),
            Self::Analysis(e) => e.is_retryable(),
            _ => false,
        }
    }
}
