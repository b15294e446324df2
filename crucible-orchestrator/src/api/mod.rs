//! API Module
//!
//! HTTP layer over the pipeline use cases. Handlers translate JSON requests
//! into use-case commands and engine errors into status codes.

pub mod error;
pub mod health;
pub mod pipeline;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crucible_engine::usecase::{CancelPipeline, RunPipeline, ValidatePipeline};

/// Shared handler state: one instance of each use case.
#[derive(Clone)]
pub struct AppState {
    pub validate: Arc<ValidatePipeline>,
    pub run: Arc<RunPipeline>,
    pub cancel: Arc<CancelPipeline>,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Pipeline endpoints
        .route("/pipeline/validate", post(pipeline::validate_pipeline))
        .route("/pipeline/run", post(pipeline::run_pipeline))
        .route("/pipeline/{id}/cancel", post(pipeline::cancel_pipeline))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
