//! Job API Definitions
//!
//! Data Transfer Objects returned by the job status endpoints.

use super::queue::JobCounts;
use super::types::*;
use serde::{Deserialize, Serialize};

pub const ENDPOINT_JOBS: &str = "/jobs";
pub const ENDPOINT_JOB_STATUS: &str = "/jobs/:id";

#[derive(Debug, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub job_id: JobId,
    pub handler: String,
    pub status: JobStatus,
    pub created_at: u64,
    pub started_at: Option<u64>,
    pub finished_at: Option<u64>,
}

impl JobStatusResponse {
    pub fn from_entry(job_id: JobId, entry: JobEntry) -> Self {
        Self {
            job_id,
            handler: entry.job.handler,
            status: entry.status,
            created_at: entry.created_at,
            started_at: entry.started_at,
            finished_at: entry.finished_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JobOverviewResponse {
    pub total: usize,
    pub counts: JobCounts,
}
