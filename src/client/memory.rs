//! In-Memory Remote Client
//!
//! A `RemoteDataClient` backed by local maps. It serves offline runs and every
//! test that would otherwise need the remote platform, and can be told to fail
//! specific operations to exercise error paths.

use super::RemoteDataClient;
use super::types::*;
use crate::error::AnalystError;

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Default)]
pub struct InMemoryClient {
    /// Projects keyed by short name.
    projects: DashMap<String, Project>,
    tasks: DashMap<u64, Task>,
    /// Task runs keyed by task id, in submission order.
    task_runs: DashMap<u64, Vec<TaskRun>>,
    results: DashMap<u64, TaskResult>,
    fail_task_listing: AtomicBool,
    fail_updates: AtomicBool,
    updates: AtomicUsize,
}

impl InMemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_project(&self, project: Project) {
        self.projects.insert(project.short_name.clone(), project);
    }

    pub fn add_task(&self, task: Task) {
        self.tasks.insert(task.id, task);
    }

    pub fn add_task_run(&self, run: TaskRun) {
        self.task_runs.entry(run.task_id).or_default().push(run);
    }

    pub fn add_result(&self, result: TaskResult) {
        self.results.insert(result.id, result);
    }

    pub fn result(&self, id: u64) -> Option<TaskResult> {
        self.results.get(&id).map(|r| r.clone())
    }

    /// Number of successful `update_result` calls so far.
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn fail_task_listing(&self, fail: bool) {
        self.fail_task_listing.store(fail, Ordering::SeqCst);
    }

    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl RemoteDataClient for InMemoryClient {
    async fn get_project(
        &self,
        _creds: &ApiCredentials,
        short_name: &str,
    ) -> Result<Project, AnalystError> {
        self.projects
            .get(short_name)
            .map(|p| p.clone())
            .ok_or_else(|| AnalystError::NotFound(format!("project {}", short_name)))
    }

    async fn find_tasks(
        &self,
        _creds: &ApiCredentials,
        project_id: u64,
        filter: &TaskFilter,
    ) -> Result<Vec<Task>, AnalystError> {
        if self.fail_task_listing.load(Ordering::SeqCst) {
            return Err(AnalystError::Transient("task listing unavailable".to_string()));
        }

        let mut tasks: Vec<Task> = self
            .tasks
            .iter()
            .map(|t| t.value().clone())
            .filter(|t| t.project_id == project_id)
            .filter(|t| filter.id.is_none_or(|id| t.id == id))
            .filter(|t| {
                filter
                    .state
                    .as_ref()
                    .is_none_or(|state| t.state.as_ref() == Some(state))
            })
            .collect();
        tasks.sort_by_key(|t| t.id);
        Ok(tasks)
    }

    async fn find_taskruns(
        &self,
        _creds: &ApiCredentials,
        project_id: u64,
        task_id: u64,
    ) -> Result<Vec<TaskRun>, AnalystError> {
        Ok(self
            .task_runs
            .get(&task_id)
            .map(|runs| {
                runs.iter()
                    .filter(|run| run.project_id == project_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find_results(
        &self,
        _creds: &ApiCredentials,
        project_id: u64,
        filter: &ResultFilter,
    ) -> Result<Vec<TaskResult>, AnalystError> {
        let mut results: Vec<TaskResult> = self
            .results
            .iter()
            .map(|r| r.value().clone())
            .filter(|r| r.project_id == project_id && filter.matches(r))
            .collect();
        results.sort_by_key(|r| r.id);
        if let Some(limit) = filter.limit {
            results.truncate(limit);
        }
        Ok(results)
    }

    async fn update_result(
        &self,
        _creds: &ApiCredentials,
        result: &TaskResult,
    ) -> Result<TaskResult, AnalystError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(AnalystError::Transient("result update rejected".to_string()));
        }

        let mut stored = self
            .results
            .get_mut(&result.id)
            .ok_or_else(|| AnalystError::NotFound(format!("result {}", result.id)))?;
        *stored = result.clone();
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(result.clone())
    }
}
