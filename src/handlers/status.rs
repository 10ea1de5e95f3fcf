use axum::{extract::State, response::Json};
use std::collections::HashSet;
use tracing::info;

use crate::{
    error::AppResult,
    handlers::AppState,
    models::{JobAccepted, JobKind, JobStats, StatusRefreshRequest},
    response::ApiResponse,
    services::{run_status_refresh, spawn_job},
};

/// Start a background status diff over previously known statuses
#[utoipa::path(
    post,
    path = "/status/refresh",
    request_body = StatusRefreshRequest,
    responses(
        (status = 202, description = "Refresh scheduled", body = ApiResponse<JobAccepted>),
        (status = 400, description = "Empty item list or unknown operator")
    ),
    tag = "jobs"
)]
pub async fn start_status_refresh(
    State(state): State<AppState>,
    Json(request): Json<StatusRefreshRequest>,
) -> AppResult<ApiResponse<JobAccepted>> {
    request.validate()?;
    // reject unserved operators before any session is opened
    let operators: HashSet<_> = request.items.iter().map(|item| item.operator).collect();
    for operator in &operators {
        state.sites.site_for(*operator)?;
    }

    let job_id = state.jobs.create(JobKind::StatusRefresh).await;
    info!(
        %job_id,
        count = request.items.len(),
        operators = operators.len(),
        "status refresh accepted"
    );

    let dispatcher = state.notifier.dispatcher(request.webhook_url.clone());
    let events = dispatcher.sender();
    let portals = state.portals.clone();
    spawn_job(state.jobs.clone(), job_id, dispatcher, async move {
        let stats = run_status_refresh(job_id, &request, portals.as_ref(), &events).await;
        JobStats::Status(stats)
    });

    Ok(ApiResponse::accepted(JobAccepted::started(job_id)))
}
