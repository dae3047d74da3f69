//! Job Queue
//!
//! An in-process work dispatcher. Request handlers enqueue jobs and return
//! immediately; workers in the `JobExecutor` pool claim and run them.
//!
//! ## Responsibilities
//! - **Submission**: `enqueue` / `enqueue_call` store a `Pending` entry and wake idle workers.
//! - **Claiming**: `try_claim_job` flips `Pending` to `Running` exactly once, so a job
//!   is handed to a single worker even when several race for it.
//! - **Completion**: `complete_job` records the terminal status (`Completed`, `Skipped`,
//!   `Failed`). Failed jobs are not re-queued. Only the most recent finished jobs
//!   are retained.
//! - **Durability**: when a `JobJournal` is attached, every state change schedules a
//!   snapshot. Snapshots are written one at a time on the blocking pool, and a
//!   write that a newer snapshot already covers is dropped.
//!
//! Jobs carry no ordering guarantee relative to each other beyond "older pending
//! jobs are offered first".

use super::journal::JobJournal;
use super::types::*;

use anyhow::Result;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Finished jobs kept for status queries when no retention is configured.
pub const DEFAULT_RETAINED_FINISHED: usize = 1000;

/// Aggregate counts per status, as reported by `GET /jobs`.
#[derive(Debug, Default, Clone, Serialize, PartialEq)]
pub struct JobCounts {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Snapshot bookkeeping of a journaled queue.
///
/// Every state change bumps `revision` after it is applied to the job map.
/// `written` is the revision the journal on disk covers; holding its lock
/// while collecting and saving keeps snapshots landing in revision order.
struct JournalWriter {
    journal: JobJournal,
    revision: AtomicU64,
    written: Mutex<u64>,
}

impl JournalWriter {
    fn new(journal: JobJournal) -> Self {
        Self {
            journal,
            revision: AtomicU64::new(0),
            written: Mutex::new(0),
        }
    }

    fn bump(&self) -> u64 {
        self.revision.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Saves a snapshot covering revision `wanted`, unless one already does.
    fn write(&self, jobs: &DashMap<JobId, JobEntry>, wanted: u64) -> Result<()> {
        let mut written = self
            .written
            .lock()
            .map_err(|_| anyhow::anyhow!("journal writer lock poisoned"))?;
        if *written >= wanted {
            return Ok(());
        }

        let covered = self.revision.load(Ordering::SeqCst);
        let snapshot: Vec<(JobId, JobEntry)> = jobs
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        self.journal.save(snapshot)?;
        *written = covered;
        Ok(())
    }
}

/// The central component managing job state.
pub struct JobQueue {
    /// Local storage for jobs, keyed by id.
    jobs: Arc<DashMap<JobId, JobEntry>>,
    /// Wakes idle workers when new work arrives.
    notify: Notify,
    journal: Option<Arc<JournalWriter>>,
    /// How many finished jobs to keep before the oldest are dropped.
    retain_finished: usize,
}

impl JobQueue {
    /// Creates an empty, memory-only queue.
    pub fn new() -> Self {
        Self {
            jobs: Arc::new(DashMap::new()),
            notify: Notify::new(),
            journal: None,
            retain_finished: DEFAULT_RETAINED_FINISHED,
        }
    }

    /// Creates a queue backed by a journal, restoring any unfinished jobs from it.
    pub fn with_journal(journal: JobJournal) -> Result<Self> {
        let restored = journal.load()?;
        let jobs = Arc::new(DashMap::new());
        let mut pending = 0usize;
        for (job_id, entry) in restored {
            if entry.status == JobStatus::Pending {
                pending += 1;
            }
            jobs.insert(job_id, entry);
        }

        tracing::info!(
            "Restored {} jobs ({} pending) from {}",
            jobs.len(),
            pending,
            journal.path().display()
        );

        Ok(Self {
            jobs,
            notify: Notify::new(),
            journal: Some(Arc::new(JournalWriter::new(journal))),
            retain_finished: DEFAULT_RETAINED_FINISHED,
        })
    }

    /// Sets how many finished jobs stay queryable; older ones are evicted.
    pub fn retain_finished(mut self, count: usize) -> Self {
        self.retain_finished = count;
        self
    }

    /// Enqueues a job whose arguments are a single serializable value.
    ///
    /// Returns as soon as the job is stored; the handler runs later on a worker.
    pub fn enqueue<P: Serialize>(&self, handler: &str, payload: &P, timeout: Duration) -> Result<JobId> {
        let payload = serde_json::to_value(payload)?;
        self.enqueue_call(handler, payload, timeout)
    }

    /// Enqueues a job from an already-built keyword-argument object.
    pub fn enqueue_call(
        &self,
        handler: &str,
        kwargs: serde_json::Value,
        timeout: Duration,
    ) -> Result<JobId> {
        let job_id = JobId::new();
        let job = Job {
            handler: handler.to_string(),
            payload: kwargs,
            timeout_secs: timeout.as_secs().max(1),
        };

        self.jobs.insert(job_id.clone(), JobEntry::pending(job));
        tracing::debug!("Enqueued job {} (handler: {})", job_id.0, handler);

        self.persist();
        self.notify.notify_waiters();
        Ok(job_id)
    }

    /// Retrieves all jobs that are eligible for execution, oldest first.
    pub fn pending_jobs(&self) -> Vec<(JobId, JobEntry)> {
        let mut jobs: Vec<(JobId, JobEntry)> = self
            .jobs
            .iter()
            .filter(|entry| entry.value().status == JobStatus::Pending)
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        jobs.sort_by_key(|(_, entry)| entry.created_at);
        jobs
    }

    /// Attempts to lock a pending job for execution by a worker.
    ///
    /// Returns `false` when another worker already claimed it.
    pub fn try_claim_job(&self, job_id: &JobId) -> bool {
        let claimed = match self.jobs.get_mut(job_id) {
            Some(mut entry) if entry.status == JobStatus::Pending => {
                entry.status = JobStatus::Running;
                entry.started_at = Some(now_ms());
                true
            }
            _ => false,
        };

        if claimed {
            tracing::debug!("Claimed job {}", job_id.0);
            self.persist();
        }
        claimed
    }

    /// Records the terminal status of a job.
    pub fn complete_job(&self, job_id: &JobId, status: JobStatus) -> Result<()> {
        {
            let mut entry = self
                .jobs
                .get_mut(job_id)
                .ok_or_else(|| anyhow::anyhow!("Job not found: {}", job_id.0))?;

            match &status {
                JobStatus::Completed => tracing::info!("Job {} completed", job_id.0),
                JobStatus::Skipped { reason } => {
                    tracing::info!("Job {} had nothing to do: {}", job_id.0, reason)
                }
                JobStatus::Failed { kind, error } => {
                    tracing::error!("Job {} failed ({:?}): {}", job_id.0, kind, error)
                }
                JobStatus::Pending | JobStatus::Running => {
                    return Err(anyhow::anyhow!("{:?} is not a terminal status", status));
                }
            }

            entry.status = status;
            entry.finished_at = Some(now_ms());
        }

        self.evict_finished();
        self.persist();
        Ok(())
    }

    /// Drops the oldest finished jobs beyond the retention count.
    fn evict_finished(&self) {
        let mut finished: Vec<(u64, JobId)> = self
            .jobs
            .iter()
            .filter(|entry| entry.status.is_finished())
            .map(|entry| (entry.finished_at.unwrap_or(0), entry.key().clone()))
            .collect();
        if finished.len() <= self.retain_finished {
            return;
        }

        finished.sort();
        let excess = finished.len() - self.retain_finished;
        for (_, job_id) in finished.into_iter().take(excess) {
            self.jobs.remove(&job_id);
        }
        tracing::debug!("Evicted {} finished jobs", excess);
    }

    pub fn get_job(&self, job_id: &JobId) -> Option<JobEntry> {
        self.jobs.get(job_id).map(|entry| entry.clone())
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    pub fn status_counts(&self) -> JobCounts {
        let mut counts = JobCounts::default();
        for entry in self.jobs.iter() {
            match entry.status {
                JobStatus::Pending => counts.pending += 1,
                JobStatus::Running => counts.running += 1,
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Skipped { .. } => counts.skipped += 1,
                JobStatus::Failed { .. } => counts.failed += 1,
            }
        }
        counts
    }

    /// Resolves on the next enqueue. Workers pair this with a poll interval,
    /// since a wake-up sent before they started waiting is not replayed.
    pub async fn wait_for_work(&self) {
        self.notify.notified().await;
    }

    /// Writes the journal now, covering every change made so far.
    pub fn flush(&self) -> Result<()> {
        match &self.journal {
            Some(journal) => journal.write(&self.jobs, journal.revision.load(Ordering::SeqCst)),
            None => Ok(()),
        }
    }

    /// Schedules a snapshot. Inside a runtime the write runs on the blocking
    /// pool; outside one it happens before returning.
    fn persist(&self) {
        let Some(journal) = &self.journal else {
            return;
        };
        let wanted = journal.bump();

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let journal = journal.clone();
                let jobs = self.jobs.clone();
                runtime.spawn_blocking(move || {
                    if let Err(e) = journal.write(&jobs, wanted) {
                        tracing::warn!("Failed to snapshot job journal: {:#}", e);
                    }
                });
            }
            Err(_) => {
                if let Err(e) = journal.write(&self.jobs, wanted) {
                    tracing::warn!("Failed to snapshot job journal: {:#}", e);
                }
            }
        }
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}
