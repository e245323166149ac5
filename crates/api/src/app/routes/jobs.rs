//! Job administration: list, pause, resume and reschedule.
//!
//! Administrative outcomes are always HTTP 200 with a `{message}` body that
//! carries either the success text or the error text.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use indexsync_core::JobSnapshot;
use indexsync_infra::jobs::Registry;
use tracing::info;

use crate::app::dto::{MessageResponse, UpdateJobRequest};
use crate::app::errors::json_error;

/// GET /jobs - snapshot of every registered job, sorted by name
pub async fn list_jobs(Extension(registry): Extension<Arc<Registry>>) -> Json<Vec<JobSnapshot>> {
    Json(registry.list())
}

/// POST /jobs/:name/pause
pub async fn pause_job(
    Extension(registry): Extension<Arc<Registry>>,
    Path(name): Path<String>,
) -> Json<MessageResponse> {
    let result = registry.pause(&name).await;
    info!(job = %name, ok = result.is_ok(), "pause requested");
    Json(MessageResponse::from_result(result, "Job paused"))
}

/// POST /jobs/:name/resume
pub async fn resume_job(
    Extension(registry): Extension<Arc<Registry>>,
    Path(name): Path<String>,
) -> Json<MessageResponse> {
    let result = registry.resume(&name).await;
    info!(job = %name, ok = result.is_ok(), "resume requested");
    Json(MessageResponse::from_result(result, "Job resumed"))
}

/// POST /jobs/update - new trigger expression and/or batch limit
pub async fn update_job(
    Extension(registry): Extension<Arc<Registry>>,
    body: Result<Json<UpdateJobRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return json_error(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    let response = match body.batch_limit() {
        Ok(limit) => {
            let result = registry
                .reschedule(&body.name, &body.trigger_expression, limit)
                .await;
            info!(job = %body.name, ok = result.is_ok(), "reschedule requested");
            MessageResponse::from_result(result, "Job updated")
        }
        Err(e) => MessageResponse {
            message: e.to_string(),
        },
    };

    Json(response).into_response()
}
