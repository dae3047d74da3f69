use super::protocol::*;
use super::queue::JobQueue;
use super::types::*;

use axum::{Extension, Json, extract::Path, http::StatusCode};
use std::sync::Arc;

pub async fn handle_get_job_status(
    Extension(queue): Extension<Arc<JobQueue>>,
    Path(job_id_str): Path<String>,
) -> (StatusCode, Json<Option<JobStatusResponse>>) {
    let job_id = JobId(job_id_str);

    match queue.get_job(&job_id) {
        Some(entry) => {
            tracing::debug!("Job status query: {} -> {:?}", job_id.0, entry.status);
            (
                StatusCode::OK,
                Json(Some(JobStatusResponse::from_entry(job_id, entry))),
            )
        }
        None => {
            tracing::debug!("Job not found: {}", job_id.0);
            (StatusCode::NOT_FOUND, Json(None))
        }
    }
}

pub async fn handle_job_overview(
    Extension(queue): Extension<Arc<JobQueue>>,
) -> Json<JobOverviewResponse> {
    Json(JobOverviewResponse {
        total: queue.job_count(),
        counts: queue.status_counts(),
    })
}
