//! Consensus analysis job body.
//!
//! Fetches one task's runs and result through the remote client, runs the pure
//! consensus over them, and writes the reconciled result back in one update.

use super::consensus::{Analysis, analyse};
use super::types::ConsensusSettings;
use crate::client::RemoteDataClient;
use crate::client::types::{ApiCredentials, InfoMap, ResultFilter, TaskResult};
use crate::error::AnalystError;
use crate::executor::registry::JobHandlerRegistry;
use crate::executor::types::{Job, JobOutcome};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub const ANALYSE_TASK_HANDLER: &str = "analyse_task";

/// Arguments of one analysis job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisJob {
    pub credentials: ApiCredentials,
    pub short_name: String,
    pub task_id: u64,
    pub settings: ConsensusSettings,
    /// Seconds to wait before the first remote call, spreading API load.
    #[serde(default)]
    pub delay_secs: Option<u64>,
}

pub struct ConsensusAnalyzer {
    client: Arc<dyn RemoteDataClient>,
}

impl ConsensusAnalyzer {
    pub fn new(client: Arc<dyn RemoteDataClient>) -> Self {
        Self { client }
    }

    pub async fn analyse_task(&self, job: &AnalysisJob) -> Result<JobOutcome, AnalystError> {
        if let Some(delay) = job.delay_secs.filter(|d| *d > 0) {
            tokio::time::sleep(Duration::from_secs(delay)).await;
        }

        let creds = &job.credentials;
        let project = self.client.get_project(creds, &job.short_name).await?;
        let runs = self
            .client
            .find_taskruns(creds, project.id, job.task_id)
            .await?;

        let mut run_ids = Vec::with_capacity(runs.len());
        let mut infos: Vec<InfoMap> = Vec::with_capacity(runs.len());
        for run in &runs {
            match run.info_map() {
                Ok(info) => {
                    run_ids.push(run.id);
                    infos.push(info);
                }
                Err(e) => tracing::warn!("Skipping task run {}: {}", run.id, e),
            }
        }

        let consensus = match analyse(&infos, &job.settings) {
            Analysis::NothingToAnalyse => {
                return Ok(JobOutcome::NothingToDo(format!(
                    "task {} has no task runs to analyse",
                    job.task_id
                )));
            }
            Analysis::Consensus(consensus) => consensus,
        };

        let Some(result) = self
            .client
            .first_result(creds, project.id, &ResultFilter::for_task(job.task_id))
            .await?
        else {
            return Ok(JobOutcome::NothingToDo(format!(
                "task {} has no result yet",
                job.task_id
            )));
        };

        let updated = TaskResult {
            task_run_ids: run_ids,
            status: consensus.status(),
            info: consensus.info.clone(),
            ..result.clone()
        };

        if updated == result {
            tracing::debug!("Result {} already up to date", result.id);
            return Ok(JobOutcome::Done);
        }

        self.client.update_result(creds, &updated).await?;
        tracing::info!(
            "Result {} for {}/{} analysed: {} fields agreed, {} unresolved ({} runs)",
            result.id,
            job.short_name,
            job.task_id,
            consensus.info.len(),
            consensus.unresolved.len(),
            consensus.total_runs
        );
        Ok(JobOutcome::Done)
    }
}

/// Decodes a job payload, treating a malformed payload as a validation failure.
pub fn decode_payload<T: serde::de::DeserializeOwned>(job: &Job) -> Result<T, AnalystError> {
    serde_json::from_value(job.payload.clone())
        .map_err(|e| AnalystError::Validation(format!("{} payload: {}", job.handler, e)))
}

/// Missing remote records mean there is nothing to do, not that the job failed.
pub fn not_found_is_nothing_to_do(
    outcome: Result<JobOutcome, AnalystError>,
) -> anyhow::Result<JobOutcome> {
    match outcome {
        Err(e) if e.is_not_found() => Ok(JobOutcome::NothingToDo(e.to_string())),
        other => Ok(other?),
    }
}

pub fn register(registry: &JobHandlerRegistry, analyzer: Arc<ConsensusAnalyzer>) {
    registry.register(ANALYSE_TASK_HANDLER, move |job: Job| {
        let analyzer = analyzer.clone();
        async move {
            let outcome = match decode_payload::<AnalysisJob>(&job) {
                Ok(args) => analyzer.analyse_task(&args).await,
                Err(e) => Err(e),
            };
            not_found_is_nothing_to_do(outcome)
        }
    });
}
