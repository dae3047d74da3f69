//! Worker Pool Implementation
//!
//! Manages the lifecycle of job execution. It spawns background workers that continuously
//! poll the `JobQueue` for pending jobs.
//!
//! ## Responsibilities
//! - **Polling**: waiting for `Pending` jobs, woken early by new submissions.
//! - **Timeouts**: each job body runs as its own tokio task; when its timeout elapses
//!   the task is aborted and the job is recorded as `Failed` with kind `Timeout`.
//! - **Classification**: errors returned by job bodies are classified through
//!   `crate::error::classify` before they are recorded.

use super::queue::JobQueue;
use super::registry::JobHandlerRegistry;
use super::types::*;
use crate::error::{ErrorKind, classify};

use std::sync::Arc;
use std::time::Duration;

/// How long an idle worker sleeps before re-checking the queue on its own.
const IDLE_POLL: Duration = Duration::from_millis(100);

/// The engine that drives job execution.
pub struct JobExecutor {
    /// Source of jobs.
    queue: Arc<JobQueue>,
    /// Registry containing the actual code (closures) for jobs.
    handlers: Arc<JobHandlerRegistry>,
    /// Number of concurrent workers; the only bound on parallel jobs.
    worker_count: usize,
}

impl JobExecutor {
    pub fn new(
        queue: Arc<JobQueue>,
        handlers: Arc<JobHandlerRegistry>,
        worker_count: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            queue,
            handlers,
            worker_count: worker_count.max(1),
        })
    }

    /// Spawns the workers and returns immediately.
    /// Each worker runs independently in an infinite loop.
    pub fn start(self: &Arc<Self>) -> Vec<tokio::task::JoinHandle<()>> {
        tracing::info!("Starting {} job workers", self.worker_count);

        (0..self.worker_count)
            .map(|worker_id| {
                let executor = self.clone();
                tokio::spawn(async move {
                    executor.worker_loop(worker_id).await;
                })
            })
            .collect()
    }

    /// The main loop for a single worker.
    async fn worker_loop(&self, worker_id: usize) {
        tracing::info!("Worker {} started", worker_id);

        loop {
            if !self.run_next(worker_id).await {
                tokio::select! {
                    _ = self.queue.wait_for_work() => {}
                    _ = tokio::time::sleep(IDLE_POLL) => {}
                }
            }
        }
    }

    /// Claims and runs at most one pending job.
    ///
    /// Returns `false` when there was nothing this worker could claim.
    pub async fn run_next(&self, worker_id: usize) -> bool {
        for (job_id, entry) in self.queue.pending_jobs() {
            if !self.queue.try_claim_job(&job_id) {
                tracing::trace!("Job {} already claimed by another worker", job_id.0);
                continue;
            }

            tracing::info!(
                "Worker {} claimed job {} (handler: {})",
                worker_id,
                job_id.0,
                entry.job.handler
            );

            let status = self.execute_with_timeout(entry.job).await;
            if let Err(e) = self.queue.complete_job(&job_id, status) {
                tracing::error!("Failed to complete job {}: {}", job_id.0, e);
            }
            return true;
        }
        false
    }

    /// Runs the job body on its own task so a timeout can forcibly terminate it
    /// and a panic is reported instead of killing the worker.
    async fn execute_with_timeout(&self, job: Job) -> JobStatus {
        let timeout = job.timeout();
        let handlers = self.handlers.clone();
        let mut handle = tokio::spawn(async move { handlers.execute(&job).await });

        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(Ok(JobOutcome::Done))) => JobStatus::Completed,
            Ok(Ok(Ok(JobOutcome::NothingToDo(reason)))) => JobStatus::Skipped { reason },
            Ok(Ok(Err(e))) => JobStatus::Failed {
                kind: classify(&e),
                error: format!("{:#}", e),
            },
            Ok(Err(join_error)) => JobStatus::Failed {
                kind: ErrorKind::Internal,
                error: format!("job panicked: {}", join_error),
            },
            Err(_) => {
                handle.abort();
                JobStatus::Failed {
                    kind: ErrorKind::Timeout,
                    error: format!("job exceeded its timeout of {}s", timeout.as_secs()),
                }
            }
        }
    }
}
