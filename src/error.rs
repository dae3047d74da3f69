//! Error Taxonomy
//!
//! Every failure that can cross a job boundary is classified into one of the
//! kinds below so the job status record can tell "nothing to do" apart from
//! "the remote platform is unreachable".

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Failure classes recorded against failed jobs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    RateLimited,
    Transient,
    Validation,
    Timeout,
    Io,
    /// Anything not raised through `AnalystError` (handler bugs, panics).
    Internal,
}

#[derive(Debug, Error)]
pub enum AnalystError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limited by remote platform (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("transient remote failure: {0}")]
    Transient(String),

    #[error("validation failure: {0}")]
    Validation(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive failure: {0}")]
    Archive(#[from] zip::result::ZipError),
}

impl AnalystError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalystError::NotFound(_) => ErrorKind::NotFound,
            AnalystError::RateLimited { .. } => ErrorKind::RateLimited,
            AnalystError::Transient(_) => ErrorKind::Transient,
            AnalystError::Validation(_) => ErrorKind::Validation,
            AnalystError::Timeout(_) => ErrorKind::Timeout,
            AnalystError::Io(_) | AnalystError::Archive(_) => ErrorKind::Io,
        }
    }

    /// Whether a caller layer may retry the operation with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AnalystError::RateLimited { .. } | AnalystError::Transient(_) | AnalystError::Timeout(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AnalystError::NotFound(_))
    }
}

impl From<reqwest::Error> for AnalystError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AnalystError::Validation(err.to_string())
        } else if err.status() == Some(reqwest::StatusCode::NOT_FOUND) {
            AnalystError::NotFound(err.to_string())
        } else {
            AnalystError::Transient(err.to_string())
        }
    }
}

/// Classifies an arbitrary job error, looking through `anyhow` context.
pub fn classify(err: &anyhow::Error) -> ErrorKind {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<AnalystError>())
        .map(AnalystError::kind)
        .unwrap_or(ErrorKind::Internal)
}
