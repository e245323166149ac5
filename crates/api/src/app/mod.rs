//! Admin HTTP application wiring (Axum router + service wiring).
//!
//! - `services.rs`: infrastructure wiring (checkpoint store, sources, sinks, jobs)
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: error responses

use std::sync::Arc;

use axum::{Extension, Router, http::Method, http::header::CONTENT_TYPE, routing::get};
use indexsync_infra::jobs::Registry;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router over an already constructed registry.
pub fn build_app(registry: Arc<Registry>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router())
        .layer(Extension(registry))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
}
