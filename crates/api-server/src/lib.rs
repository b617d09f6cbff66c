//! REST API server for the VidioLingua dubbing pipeline
//!
//! Accepts a video upload, runs the dubbing pipeline in the background
//! and serves status, result and artifact downloads for polling clients.

mod handlers;
mod types;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use vidiolingua_pipeline::{PipelineConfig, PipelineRunner};
use vidiolingua_registry::JobRegistry;

pub use handlers::*;
pub use types::*;

/// Uploads above this size are rejected outright
const MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

/// API server state shared across handlers
#[derive(Clone)]
pub struct ApiState {
    /// In-memory job registry
    pub registry: JobRegistry,
    /// Pipeline runner jobs are dispatched onto
    pub runner: PipelineRunner,
}

impl ApiState {
    /// Create new API state around a fresh registry
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        let registry = JobRegistry::new();
        let runner = PipelineRunner::new(registry.clone(), config);
        Self { registry, runner }
    }
}

/// Build the API router with all endpoints
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        // Health check
        .route("/api/health", get(health_check))
        // Upload + background dispatch
        .route("/api/upload", post(upload))
        // Polling endpoints
        .route("/api/job-status/{job_id}", get(job_status))
        .route("/api/result/{job_id}", get(job_result))
        .route("/api/result/{job_id}/file/{filename}", get(result_file))
        // Middleware
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the API server
pub async fn start_server(addr: &str, state: ApiState) -> Result<(), std::io::Error> {
    tracing::info!("Starting API server on {}", addr);

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await
}
