use super::batch::{BatchJob, REANALYSE_PROJECT_HANDLER, batch_timeout};
use super::types::{ReanalyseRequest, ReanalyseResponse};
use crate::analysis::types::ConsensusSettings;
use crate::http::{error_response, message};
use crate::state::AppState;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use std::sync::Arc;
use std::time::Duration;

/// Queues a paced reanalysis of a project's tasks.
///
/// Settings come from the project's category; an explicit match percentage or
/// excluded key list overrides them, falling back to the global defaults when
/// the category has no analyzer.
pub async fn handle_reanalyse(
    Extension(state): Extension<Arc<AppState>>,
    Path(short_name): Path<String>,
    Json(req): Json<ReanalyseRequest>,
) -> Response {
    let creds = &state.credentials;
    let project = match state.client.get_project(creds, &short_name).await {
        Ok(project) => project,
        Err(e) => return error_response(&e),
    };

    let overridden = req.match_percentage.is_some() || req.excluded_keys.is_some();
    let base = match state.catalog.for_category(project.category_id) {
        Some(settings) => settings.clone(),
        None if overridden => state.catalog.defaults().clone(),
        None => {
            return message(
                StatusCode::NOT_FOUND,
                "No analyst configured for this category of project",
            );
        }
    };
    let settings = ConsensusSettings {
        match_percentage: req.match_percentage.unwrap_or(base.match_percentage),
        excluded_keys: match req.excluded_keys {
            Some(keys) => keys.into_iter().collect(),
            None => base.excluded_keys,
        },
        normalization: base.normalization,
    };

    let scope = req.scope.unwrap_or_default();
    // Listed once here; the batch job reuses these ids instead of listing again.
    let targets = match state.scheduler.targets(creds, project.id, &scope).await {
        Ok(ids) => ids,
        Err(e) => return error_response(&e),
    };
    let tasks = targets.len();

    let delay = req
        .sleep
        .map(Duration::from_secs)
        .unwrap_or(state.timings.pacing_delay);
    let timeout = batch_timeout(tasks, delay, state.timings.listing_timeout);

    let job = BatchJob {
        credentials: creds.clone(),
        short_name: project.short_name.clone(),
        settings,
        scope,
        delay_secs: delay.as_secs(),
        analysis_timeout_secs: state.timings.analysis_timeout.as_secs(),
        targets: Some(targets),
    };

    match state.queue.enqueue(REANALYSE_PROJECT_HANDLER, &job, timeout) {
        Ok(job_id) => {
            tracing::info!(
                "Queued reanalysis of {} tasks of {} as job {} (timeout {}s)",
                tasks,
                project.short_name,
                job_id.0,
                timeout.as_secs()
            );
            (
                StatusCode::ACCEPTED,
                Json(ReanalyseResponse {
                    job_id: job_id.0,
                    tasks,
                    timeout_secs: timeout.as_secs(),
                }),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("Failed to enqueue reanalysis: {:#}", e);
            message(StatusCode::INTERNAL_SERVER_ERROR, "Failed to queue reanalysis")
        }
    }
}
