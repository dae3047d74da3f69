//! PyBossa REST Client
//!
//! Talks to the platform's `/api/<domain_object>` endpoints. Every call carries its
//! own `ApiCredentials`, so one client instance serves all workers.
//!
//! Throttled (429), server-side (5xx) and connection failures are retried with
//! exponential backoff and jitter; when retries run out the last classified
//! error is returned to the caller.

use super::RemoteDataClient;
use super::types::*;
use crate::error::AnalystError;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

const DEFAULT_PAGE_SIZE: usize = 100;
const DEFAULT_ATTEMPTS: usize = 4;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Upper bound on a server-requested `Retry-After` wait.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

pub struct PyBossaClient {
    http_client: reqwest::Client,
    page_size: usize,
    attempts: usize,
}

impl PyBossaClient {
    pub fn new() -> Self {
        Self::with_http_client(reqwest::Client::new())
    }

    pub fn with_http_client(http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            page_size: DEFAULT_PAGE_SIZE,
            attempts: DEFAULT_ATTEMPTS,
        }
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn attempts(mut self, attempts: usize) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    fn url(creds: &ApiCredentials, path: &str) -> String {
        format!("{}/api/{}", creds.endpoint.trim_end_matches('/'), path)
    }

    /// Fetches every page of a listing.
    async fn get_all<T: DeserializeOwned>(
        &self,
        creds: &ApiCredentials,
        path: &str,
        query: Vec<(&'static str, String)>,
    ) -> Result<Vec<T>, AnalystError> {
        let mut records = Vec::new();
        let mut offset = 0usize;

        loop {
            let mut page_query = query.clone();
            page_query.push(("limit", self.page_size.to_string()));
            page_query.push(("offset", offset.to_string()));

            let page: Vec<T> = self.get_json(creds, path, &page_query).await?;
            let page_len = page.len();
            records.extend(page);

            tracing::trace!("Fetched {} {} records (offset {})", page_len, path, offset);
            if page_len < self.page_size {
                return Ok(records);
            }
            offset += page_len;
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        creds: &ApiCredentials,
        path: &str,
        query: &[(&'static str, String)],
    ) -> Result<T, AnalystError> {
        let response = self
            .send_with_retry(Method::GET, Self::url(creds, path), creds, query, None)
            .await?;
        Ok(response.json().await?)
    }

    /// Sends a request, retrying throttled and transient failures with backoff.
    async fn send_with_retry(
        &self,
        method: Method,
        url: String,
        creds: &ApiCredentials,
        query: &[(&'static str, String)],
        body: Option<&serde_json::Value>,
    ) -> Result<reqwest::Response, AnalystError> {
        let mut delay_ms = 150u64;
        let mut last_error = AnalystError::Transient("no attempt made".to_string());

        for attempt in 0..self.attempts {
            let mut request = self
                .http_client
                .request(method.clone(), url.clone())
                .query(&[("api_key", creds.api_key.as_str())])
                .query(query)
                .timeout(REQUEST_TIMEOUT);
            if let Some(body) = body {
                request = request.json(body);
            }

            let mut wait = None;
            match request.send().await {
                Ok(response) => match classify_status(&response) {
                    None => return Ok(response),
                    Some(err) => {
                        if !err.is_retryable() {
                            return Err(err);
                        }
                        if let AnalystError::RateLimited { retry_after } = &err {
                            wait = retry_after.map(|d| d.min(MAX_RETRY_AFTER));
                        }
                        last_error = err;
                    }
                },
                Err(e) => last_error = AnalystError::from(e),
            }

            if attempt + 1 == self.attempts {
                break;
            }

            let jitter = rand::random::<u64>() % 50;
            let backoff = Duration::from_millis(delay_ms + jitter);
            tracing::debug!(
                "{} {} failed (attempt {}/{}): {}",
                method,
                url,
                attempt + 1,
                self.attempts,
                last_error
            );
            tokio::time::sleep(wait.unwrap_or(backoff).max(backoff)).await;
            delay_ms = (delay_ms * 2).min(1200);
        }

        Err(last_error)
    }
}

impl Default for PyBossaClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps a non-success response to the error taxonomy. `None` means success.
pub(crate) fn classify_status(response: &reqwest::Response) -> Option<AnalystError> {
    let status = response.status();
    if status.is_success() {
        return None;
    }

    let err = match status {
        StatusCode::NOT_FOUND => AnalystError::NotFound(response.url().path().to_string()),
        StatusCode::TOO_MANY_REQUESTS => AnalystError::RateLimited {
            retry_after: response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<u64>().ok())
                .map(Duration::from_secs),
        },
        s if s.is_server_error() => AnalystError::Transient(format!("remote returned {}", s)),
        s => AnalystError::Validation(format!("remote rejected request: {}", s)),
    };
    Some(err)
}

/// PyBossa reports some failures as a 200 carrying an exception description.
fn check_exception_body(body: &serde_json::Value) -> Result<(), AnalystError> {
    let Some(message) = body.get("exception_msg").and_then(|m| m.as_str()) else {
        return Ok(());
    };
    let class = body
        .get("exception_cls")
        .and_then(|c| c.as_str())
        .unwrap_or("Exception");

    Err(match class {
        "NotFound" => AnalystError::NotFound(message.to_string()),
        "TooManyRequests" => AnalystError::RateLimited { retry_after: None },
        _ => AnalystError::Validation(format!("{}: {}", class, message)),
    })
}

fn result_query(project_id: u64, filter: &ResultFilter) -> Vec<(&'static str, String)> {
    let mut query = vec![("project_id", project_id.to_string())];
    if let Some(id) = filter.id {
        query.push(("id", id.to_string()));
    }
    if let Some(task_id) = filter.task_id {
        query.push(("task_id", task_id.to_string()));
    }
    if let Some(marker) = filter.status.and_then(ResultStatus::sentinel) {
        query.push(("info", marker.to_string()));
    }
    query
}

#[async_trait]
impl RemoteDataClient for PyBossaClient {
    async fn get_project(
        &self,
        creds: &ApiCredentials,
        short_name: &str,
    ) -> Result<Project, AnalystError> {
        let query = [
            ("short_name", short_name.to_string()),
            ("limit", "1".to_string()),
        ];
        let projects: Vec<Project> = self.get_json(creds, "project", &query).await?;
        projects
            .into_iter()
            .next()
            .ok_or_else(|| AnalystError::NotFound(format!("project {}", short_name)))
    }

    async fn find_tasks(
        &self,
        creds: &ApiCredentials,
        project_id: u64,
        filter: &TaskFilter,
    ) -> Result<Vec<Task>, AnalystError> {
        let mut query = vec![("project_id", project_id.to_string())];
        if let Some(id) = filter.id {
            query.push(("id", id.to_string()));
        }
        if let Some(state) = &filter.state {
            query.push(("state", state.clone()));
        }
        self.get_all(creds, "task", query).await
    }

    async fn find_taskruns(
        &self,
        creds: &ApiCredentials,
        project_id: u64,
        task_id: u64,
    ) -> Result<Vec<TaskRun>, AnalystError> {
        let query = vec![
            ("project_id", project_id.to_string()),
            ("task_id", task_id.to_string()),
            ("orderby", "id".to_string()),
        ];
        self.get_all(creds, "taskrun", query).await
    }

    async fn find_results(
        &self,
        creds: &ApiCredentials,
        project_id: u64,
        filter: &ResultFilter,
    ) -> Result<Vec<TaskResult>, AnalystError> {
        let query = result_query(project_id, filter);
        let results: Vec<TaskResult> = match filter.limit {
            // The platform only filters on the marker string, so a limited
            // query for analysed results could be filled with other statuses.
            Some(limit) if filter.status != Some(ResultStatus::Analysed) => {
                let mut query = query;
                query.push(("limit", limit.to_string()));
                self.get_json(creds, "result", &query).await?
            }
            _ => self.get_all(creds, "result", query).await?,
        };

        let mut results: Vec<TaskResult> =
            results.into_iter().filter(|r| filter.matches(r)).collect();
        if let Some(limit) = filter.limit {
            results.truncate(limit);
        }
        Ok(results)
    }

    async fn update_result(
        &self,
        creds: &ApiCredentials,
        result: &TaskResult,
    ) -> Result<TaskResult, AnalystError> {
        let body = serde_json::to_value(result)
            .map_err(|e| AnalystError::Validation(e.to_string()))?;
        let url = Self::url(creds, &format!("result/{}", result.id));

        let response = self
            .send_with_retry(Method::PUT, url, creds, &[], Some(&body))
            .await?;
        let body: serde_json::Value = response.json().await?;
        check_exception_body(&body)?;

        serde_json::from_value(body).map_err(|e| AnalystError::Validation(e.to_string()))
    }
}
