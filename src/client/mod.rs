//! Remote Data Client Module
//!
//! The only path to the crowdsourcing platform's datastore. This service never
//! holds authoritative task or result data itself; it reads and writes through
//! an implementation of `RemoteDataClient`.
//!
//! ## Submodules
//! - **`types`**: Projects, tasks, task runs, results and their filters.
//! - **`http`**: `PyBossaClient`, the REST implementation with backoff on throttling.
//! - **`memory`**: `InMemoryClient`, a self-contained implementation for offline use and tests.

pub mod http;
pub mod memory;
pub mod types;


use crate::error::AnalystError;
use async_trait::async_trait;
use types::*;

/// Typed accessors for the remote platform.
///
/// Implementations must be safe to share between workers; credentials travel
/// with every call instead of being configured on the client.
#[async_trait]
pub trait RemoteDataClient: Send + Sync {
    async fn get_project(
        &self,
        creds: &ApiCredentials,
        short_name: &str,
    ) -> Result<Project, AnalystError>;

    async fn find_tasks(
        &self,
        creds: &ApiCredentials,
        project_id: u64,
        filter: &TaskFilter,
    ) -> Result<Vec<Task>, AnalystError>;

    /// Task runs for one task, in submission order.
    async fn find_taskruns(
        &self,
        creds: &ApiCredentials,
        project_id: u64,
        task_id: u64,
    ) -> Result<Vec<TaskRun>, AnalystError>;

    async fn find_results(
        &self,
        creds: &ApiCredentials,
        project_id: u64,
        filter: &ResultFilter,
    ) -> Result<Vec<TaskResult>, AnalystError>;

    /// Replaces a result's content as a single write.
    async fn update_result(
        &self,
        creds: &ApiCredentials,
        result: &TaskResult,
    ) -> Result<TaskResult, AnalystError>;

    async fn first_result(
        &self,
        creds: &ApiCredentials,
        project_id: u64,
        filter: &ResultFilter,
    ) -> Result<Option<TaskResult>, AnalystError> {
        let filter = ResultFilter {
            limit: Some(1),
            ..filter.clone()
        };
        Ok(self
            .find_results(creds, project_id, &filter)
            .await?
            .into_iter()
            .next())
    }

    async fn get_task(
        &self,
        creds: &ApiCredentials,
        project_id: u64,
        task_id: u64,
    ) -> Result<Task, AnalystError> {
        self.find_tasks(creds, project_id, &TaskFilter::by_id(task_id))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AnalystError::NotFound(format!("task {}", task_id)))
    }
}
