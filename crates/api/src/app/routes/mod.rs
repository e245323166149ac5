use axum::{
    Router,
    routing::{get, post},
};

pub mod jobs;
pub mod system;

/// Router for the job administration endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/update", post(jobs::update_job))
        .route("/jobs/:name/pause", post(jobs::pause_job))
        .route("/jobs/:name/resume", post(jobs::resume_job))
}
