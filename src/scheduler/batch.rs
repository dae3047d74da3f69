//! Batch reanalysis job.
//!
//! Lists the tasks in scope for a project and submits one analysis job per
//! task, paced by a `Pacer`. The batch itself runs as a queued job; the
//! analysis jobs it submits run independently on the worker pool.

use super::pacer::{FixedIntervalPacer, Pacer};
use super::types::{BatchReport, BatchScope};
use crate::analysis::jobs::{ANALYSE_TASK_HANDLER, AnalysisJob, decode_payload, not_found_is_nothing_to_do};
use crate::analysis::types::ConsensusSettings;
use crate::client::RemoteDataClient;
use crate::client::types::{ApiCredentials, ResultFilter, TaskFilter};
use crate::error::AnalystError;
use crate::executor::queue::JobQueue;
use crate::executor::registry::JobHandlerRegistry;
use crate::executor::types::{Job, JobOutcome};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

pub const REANALYSE_PROJECT_HANDLER: &str = "reanalyse_project";

/// Arguments of one batch reanalysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJob {
    pub credentials: ApiCredentials,
    pub short_name: String,
    pub settings: ConsensusSettings,
    #[serde(default)]
    pub scope: BatchScope,
    /// Seconds between two submissions.
    pub delay_secs: u64,
    /// Timeout given to each submitted analysis job.
    pub analysis_timeout_secs: u64,
    /// Task ids already listed when the batch was requested. When absent the
    /// batch lists the scope itself.
    #[serde(default)]
    pub targets: Option<Vec<u64>>,
}

/// Time a batch over `tasks` tasks needs: listing plus one pacing delay per task.
pub fn batch_timeout(tasks: usize, delay: Duration, listing_allowance: Duration) -> Duration {
    let pacing = delay.saturating_mul(u32::try_from(tasks).unwrap_or(u32::MAX));
    listing_allowance.saturating_add(pacing)
}

pub struct BatchScheduler {
    client: Arc<dyn RemoteDataClient>,
    queue: Arc<JobQueue>,
}

impl BatchScheduler {
    pub fn new(client: Arc<dyn RemoteDataClient>, queue: Arc<JobQueue>) -> Self {
        Self { client, queue }
    }

    /// Task ids in scope, deduplicated, in listing order.
    pub async fn targets(
        &self,
        creds: &ApiCredentials,
        project_id: u64,
        scope: &BatchScope,
    ) -> Result<Vec<u64>, AnalystError> {
        let ids: Vec<u64> = match scope {
            BatchScope::Tasks { state } => {
                let filter = TaskFilter {
                    state: state.clone(),
                    ..TaskFilter::default()
                };
                self.client
                    .find_tasks(creds, project_id, &filter)
                    .await?
                    .into_iter()
                    .map(|task| task.id)
                    .collect()
            }
            BatchScope::Results { status } => {
                let filter = ResultFilter {
                    status: *status,
                    ..ResultFilter::default()
                };
                self.client
                    .find_results(creds, project_id, &filter)
                    .await?
                    .into_iter()
                    .map(|result| result.task_id)
                    .collect()
            }
        };

        let mut seen = HashSet::with_capacity(ids.len());
        Ok(ids.into_iter().filter(|id| seen.insert(*id)).collect())
    }

    /// Submits one analysis job per task in scope.
    ///
    /// Ids carried in the job are used as given. A listing failure aborts the batch before anything is submitted. A task
    /// whose job cannot be enqueued is counted and the batch moves on.
    pub async fn run<P: Pacer>(
        &self,
        job: &BatchJob,
        pacer: &mut P,
    ) -> Result<BatchReport, AnalystError> {
        let creds = &job.credentials;
        let project = self.client.get_project(creds, &job.short_name).await?;
        let task_ids = match &job.targets {
            Some(ids) => ids.clone(),
            None => self.targets(creds, project.id, &job.scope).await?,
        };

        let mut report = BatchReport {
            listed: task_ids.len(),
            ..BatchReport::default()
        };
        tracing::info!(
            "Reanalysing {} tasks of {} ({:?})",
            task_ids.len(),
            project.short_name,
            job.scope
        );

        let analysis_timeout = Duration::from_secs(job.analysis_timeout_secs);
        for task_id in task_ids {
            pacer.ready().await;

            let analysis = AnalysisJob {
                credentials: creds.clone(),
                short_name: project.short_name.clone(),
                task_id,
                settings: job.settings.clone(),
                delay_secs: None,
            };
            match self
                .queue
                .enqueue(ANALYSE_TASK_HANDLER, &analysis, analysis_timeout)
            {
                Ok(_) => report.submitted += 1,
                Err(e) => {
                    tracing::warn!("Could not submit analysis of task {}: {:#}", task_id, e);
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            "Batch for {} done: {} submitted, {} failed",
            project.short_name,
            report.submitted,
            report.failed
        );
        Ok(report)
    }
}

pub fn register(registry: &JobHandlerRegistry, scheduler: Arc<BatchScheduler>) {
    registry.register(REANALYSE_PROJECT_HANDLER, move |job: Job| {
        let scheduler = scheduler.clone();
        async move {
            let outcome = match decode_payload::<BatchJob>(&job) {
                Ok(args) => {
                    let mut pacer = FixedIntervalPacer::new(Duration::from_secs(args.delay_secs));
                    scheduler.run(&args, &mut pacer).await.map(|report| {
                        if report.listed == 0 {
                            JobOutcome::NothingToDo(format!("no tasks in scope for {}", args.short_name))
                        } else {
                            JobOutcome::Done
                        }
                    })
                }
                Err(e) => Err(e),
            };
            not_found_is_nothing_to_do(outcome)
        }
    });
}
