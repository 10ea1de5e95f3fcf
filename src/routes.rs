use axum::{
    Router,
    routing::{get, post},
};

use crate::handlers::{
    AppState, get_job, health_check, openapi_json, start_audit_batch, start_range_scan,
    start_status_refresh,
};

/// Create the API routes
pub fn create_api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/api-docs/openapi.json", get(openapi_json))
        // background jobs
        .route("/scan/range", post(start_range_scan))
        .route("/audit/batch", post(start_audit_batch))
        .route("/status/refresh", post(start_status_refresh))
        .route("/jobs/{job_id}", get(get_job))
}
