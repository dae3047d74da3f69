use super::builder::{BUILD_ZIP_HANDLER, ZipJob, sanitize_filename};
use super::importer::importer_for;
use super::types::*;
use crate::http::{error_response, message};
use crate::state::AppState;

use axum::body::Body;
use axum::extract::Path;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use std::sync::Arc;
use tokio_util::io::ReaderStream;

/// Archives are named after their project; anything else is not this project's.
fn belongs_to(short_name: &str, filename: &str) -> bool {
    filename.starts_with(&format!("{}_input_", sanitize_filename(short_name)))
}

/// Queues an archive of the given tasks' input files.
pub async fn handle_prepare_zip(
    Extension(state): Extension<Arc<AppState>>,
    Path(short_name): Path<String>,
    Json(req): Json<PrepareZipRequest>,
) -> Response {
    let task_ids = match req.task_ids.into_ids() {
        Ok(ids) => ids,
        Err(e) => return error_response(&e),
    };
    if let Err(e) = importer_for(&req.importer) {
        return error_response(&e);
    }

    let project = match state.client.get_project(&state.credentials, &short_name).await {
        Ok(project) => project,
        Err(e) => return error_response(&e),
    };

    let filename = state.archives.reserve_filename(&project.short_name);
    let job = ZipJob {
        credentials: state.credentials.clone(),
        short_name: project.short_name.clone(),
        task_ids,
        filename: filename.clone(),
        importer: req.importer,
    };

    match state
        .queue
        .enqueue(BUILD_ZIP_HANDLER, &job, state.timings.zip_timeout)
    {
        Ok(job_id) => {
            tracing::info!(
                "Queued archive {} ({} tasks) as job {}",
                filename,
                job.task_ids.len(),
                job_id.0
            );
            (
                StatusCode::ACCEPTED,
                Json(PrepareZipResponse {
                    filename,
                    job_id: job_id.0,
                }),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("Failed to enqueue archive build: {:#}", e);
            message(StatusCode::INTERNAL_SERVER_ERROR, "Failed to queue archive build")
        }
    }
}

pub async fn handle_check_zip(
    Extension(state): Extension<Arc<AppState>>,
    Path((short_name, filename)): Path<(String, String)>,
) -> Json<DownloadStatus> {
    let download_ready = belongs_to(&short_name, &filename) && state.archives.check(&filename).await;
    Json(DownloadStatus { download_ready })
}

/// Streams a ready archive once; until then answers `202` so the caller keeps waiting.
pub async fn handle_download_zip(
    Extension(state): Extension<Arc<AppState>>,
    Path((short_name, filename)): Path<(String, String)>,
) -> Response {
    if !belongs_to(&short_name, &filename) {
        return message(StatusCode::NOT_FOUND, format!("archive {} not found", filename));
    }

    match state.archives.respond(&filename).await {
        Ok(Some(download)) => {
            let disposition = format!("attachment; filename=\"{}\"", download.filename);
            let body = Body::from_stream(ReaderStream::new(download.file));
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "application/zip".to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                    (header::CONTENT_LENGTH, download.len.to_string()),
                ],
                body,
            )
                .into_response()
        }
        Ok(None) => (
            StatusCode::ACCEPTED,
            Json(DownloadStatus {
                download_ready: false,
            }),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}
