//! Zip Endpoint Types

use crate::error::AnalystError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Task ids as a whitespace separated string (as typed into a form) or a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TaskIdList {
    Text(String),
    Ids(Vec<u64>),
}

impl TaskIdList {
    /// The ids in the order given, each kept once.
    pub fn into_ids(self) -> Result<Vec<u64>, AnalystError> {
        let ids: Vec<u64> = match self {
            TaskIdList::Ids(ids) => ids,
            TaskIdList::Text(text) => text
                .split_whitespace()
                .map(|id| {
                    id.parse::<u64>()
                        .map_err(|_| AnalystError::Validation(format!("invalid task id: {}", id)))
                })
                .collect::<Result<_, _>>()?,
        };
        let mut seen = HashSet::with_capacity(ids.len());
        Ok(ids.into_iter().filter(|id| seen.insert(*id)).collect())
    }
}

#[derive(Debug, Deserialize)]
pub struct PrepareZipRequest {
    pub task_ids: TaskIdList,
    pub importer: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PrepareZipResponse {
    pub filename: String,
    pub job_id: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct DownloadStatus {
    pub download_ready: bool,
}
