use crate::error::ErrorKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Unique identifier for a job in the queue.
///
/// Wrapper around a UUID string so ids survive a round trip through the journal
/// and the HTTP status API unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(pub String);

impl JobId {
    /// Generates a new random UUID v4-based JobId.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

/// Represents the lifecycle state of a job in the queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    /// Job has been enqueued but not yet picked up by any worker.
    Pending,
    /// Job is currently being processed by a worker.
    Running,
    /// Job body finished and wrote its effects.
    Completed,
    /// Job body ran but found nothing to do (missing project, no task runs...).
    Skipped { reason: String },
    /// Job body returned an error, panicked, or exceeded its timeout.
    /// Failed jobs are never retried automatically.
    Failed { kind: ErrorKind, error: String },
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        !matches!(self, JobStatus::Pending | JobStatus::Running)
    }
}

/// The definition of a unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// The name of the registered handler to invoke (e.g. "analyse_task").
    pub handler: String,
    /// Keyword arguments passed to the handler function.
    pub payload: serde_json::Value,
    /// Hard limit on the handler's wall-clock run time.
    pub timeout_secs: u64,
}

impl Job {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// What a job body reports when it returns without error.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Done,
    NothingToDo(String),
}

/// The internal representation of a job stored within the `JobQueue`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEntry {
    pub job: Job,
    pub status: JobStatus,
    /// Timestamp (ms) when the job was enqueued.
    pub created_at: u64,
    /// Timestamp (ms) when a worker claimed the job.
    pub started_at: Option<u64>,
    /// Timestamp (ms) when the job reached a terminal status.
    pub finished_at: Option<u64>,
}

impl JobEntry {
    pub fn pending(job: Job) -> Self {
        Self {
            job,
            status: JobStatus::Pending,
            created_at: now_ms(),
            started_at: None,
            finished_at: None,
        }
    }
}

/// Helper to get the current system time in milliseconds.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// Helper to get the current system time in whole seconds.
pub fn now_secs() -> u64 {
    now_ms() / 1000
}
