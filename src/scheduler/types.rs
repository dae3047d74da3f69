//! Batch Reanalysis Types

use crate::analysis::types::MatchPercentage;
use crate::client::types::ResultStatus;
use serde::{Deserialize, Serialize};

/// Which tasks of a project a batch reanalysis covers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BatchScope {
    /// Every task, optionally only those in one state (e.g. "completed").
    Tasks {
        #[serde(default)]
        state: Option<String>,
    },
    /// The tasks behind results in one status, or behind every result.
    Results {
        #[serde(default)]
        status: Option<ResultStatus>,
    },
}

impl Default for BatchScope {
    fn default() -> Self {
        BatchScope::Tasks { state: None }
    }
}

/// What one batch run did.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BatchReport {
    /// Distinct tasks found in scope.
    pub listed: usize,
    pub submitted: usize,
    /// Tasks whose analysis job could not be enqueued.
    pub failed: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReanalyseRequest {
    /// Seconds between submissions.
    pub sleep: Option<u64>,
    pub scope: Option<BatchScope>,
    pub match_percentage: Option<MatchPercentage>,
    pub excluded_keys: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReanalyseResponse {
    pub job_id: String,
    /// Tasks in scope when the batch was queued.
    pub tasks: usize,
    pub timeout_secs: u64,
}
