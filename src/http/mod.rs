//! HTTP surface
//!
//! Routes requests to the subsystem handlers and maps the error taxonomy onto
//! status codes: missing records are a definitive 404, throttling and transient
//! failures a "try again later" 503.

use crate::analysis::handlers::{handle_analyse, handle_edit_result, handle_next_result};
use crate::archive::handlers::{handle_check_zip, handle_download_zip, handle_prepare_zip};
use crate::error::AnalystError;
use crate::executor::handlers::{handle_get_job_status, handle_job_overview};
use crate::executor::protocol::{ENDPOINT_JOB_STATUS, ENDPOINT_JOBS};
use crate::scheduler::handlers::handle_reanalyse;
use crate::state::AppState;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

pub fn message(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(MessageResponse {
            message: message.into(),
        }),
    )
        .into_response()
}

pub fn error_response(err: &AnalystError) -> Response {
    let status = match err {
        AnalystError::NotFound(_) => StatusCode::NOT_FOUND,
        AnalystError::RateLimited { .. } | AnalystError::Transient(_) | AnalystError::Timeout(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        AnalystError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AnalystError::Io(_) | AnalystError::Archive(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status == StatusCode::SERVICE_UNAVAILABLE {
        tracing::warn!("Remote platform unavailable: {}", err);
        return message(status, "The remote platform is unavailable, try again later");
    }
    message(status, err.to_string())
}

pub fn router(state: Arc<AppState>) -> Router {
    let queue = state.queue.clone();

    Router::new()
        .route("/analyse", post(handle_analyse))
        .route("/projects/:short_name/next", get(handle_next_result))
        .route("/projects/:short_name/results/:result_id", put(handle_edit_result))
        .route("/projects/:short_name/reanalyse", post(handle_reanalyse))
        .route("/projects/:short_name/zip", post(handle_prepare_zip))
        .route("/projects/:short_name/zip/:filename/check", get(handle_check_zip))
        .route("/projects/:short_name/zip/:filename/download", post(handle_download_zip))
        .route(ENDPOINT_JOBS, get(handle_job_overview))
        .route(ENDPOINT_JOB_STATUS, get(handle_get_job_status))
        .layer(Extension(state))
        .layer(Extension(queue))
}
