use super::jobs::{ANALYSE_TASK_HANDLER, AnalysisJob};
use super::types::*;
use crate::client::types::{InfoMap, ResultFilter, ResultStatus, TaskResult};
use crate::http::{error_response, message};
use crate::state::AppState;

use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use std::sync::Arc;

/// Webhook fired when a task completes: analyse it with its category's analyzer.
pub async fn handle_analyse(
    Extension(state): Extension<Arc<AppState>>,
    Json(req): Json<AnalyseRequest>,
) -> Response {
    let project = match state
        .client
        .get_project(&state.credentials, &req.project_short_name)
        .await
    {
        Ok(project) => project,
        Err(e) => return error_response(&e),
    };

    let Some(settings) = state.catalog.for_category(project.category_id) else {
        tracing::debug!(
            "No analyzer for category {:?} of {}",
            project.category_id,
            project.short_name
        );
        return message(
            StatusCode::NOT_FOUND,
            "No analyst configured for this category of project",
        );
    };

    let job = AnalysisJob {
        credentials: state.credentials.clone(),
        short_name: project.short_name.clone(),
        task_id: req.task_id,
        settings: settings.clone(),
        delay_secs: None,
    };

    match state
        .queue
        .enqueue(ANALYSE_TASK_HANDLER, &job, state.timings.analysis_timeout)
    {
        Ok(job_id) => {
            tracing::info!(
                "Queued analysis of {}/{} as job {}",
                project.short_name,
                req.task_id,
                job_id.0
            );
            (StatusCode::OK, Json(AnalyseResponse { job_id: job_id.0 })).into_response()
        }
        Err(e) => {
            tracing::error!("Failed to enqueue analysis job: {:#}", e);
            message(StatusCode::INTERNAL_SERVER_ERROR, "Failed to queue analysis")
        }
    }
}

/// The next result still waiting for analysis (or, with `?status=unverified`,
/// for a human to verify it).
pub async fn handle_next_result(
    Extension(state): Extension<Arc<AppState>>,
    Path(short_name): Path<String>,
    Query(params): Query<NextResultParams>,
) -> Response {
    let status = match params.status.as_deref().map(str::parse::<ResultStatus>) {
        None => ResultStatus::Unanalysed,
        Some(Ok(status)) => status,
        Some(Err(e)) => return error_response(&e),
    };

    let project = match state.client.get_project(&state.credentials, &short_name).await {
        Ok(project) => project,
        Err(e) => return error_response(&e),
    };

    match state
        .client
        .first_result(&state.credentials, project.id, &ResultFilter::with_status(status))
        .await
    {
        Ok(Some(result)) => (
            StatusCode::OK,
            Json(NextResultResponse {
                result_id: result.id,
                task_id: result.task_id,
            }),
        )
            .into_response(),
        Ok(None) => message(
            StatusCode::NOT_FOUND,
            format!("There are no {:?} results to process", status).to_lowercase(),
        ),
        Err(e) => error_response(&e),
    }
}

/// Direct human edit: replaces a result's fields and marks it analysed.
pub async fn handle_edit_result(
    Extension(state): Extension<Arc<AppState>>,
    Path((short_name, result_id)): Path<(String, u64)>,
    Json(info): Json<InfoMap>,
) -> Response {
    let creds = &state.credentials;
    let project = match state.client.get_project(creds, &short_name).await {
        Ok(project) => project,
        Err(e) => return error_response(&e),
    };

    let result = match state
        .client
        .first_result(creds, project.id, &ResultFilter::by_id(result_id))
        .await
    {
        Ok(Some(result)) => result,
        Ok(None) => return message(StatusCode::NOT_FOUND, format!("result {} not found", result_id)),
        Err(e) => return error_response(&e),
    };

    let edited = TaskResult {
        status: ResultStatus::Analysed,
        info,
        ..result
    };

    match state.client.update_result(creds, &edited).await {
        Ok(updated) => {
            tracing::info!("Result {} of {} edited by hand", updated.id, short_name);
            (StatusCode::OK, Json(updated)).into_response()
        }
        Err(e) => error_response(&e),
    }
}
