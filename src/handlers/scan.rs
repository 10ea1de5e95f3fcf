use axum::{extract::State, response::Json};
use tracing::info;

use crate::{
    error::AppResult,
    handlers::AppState,
    models::{JobAccepted, JobKind, JobStats, ScanRequest},
    response::ApiResponse,
    services::{CallSettings, run_scan, spawn_job},
};

/// Start a background range scan
///
/// Results are POSTed to `webhook_url` as `scan_started`, `item`,
/// `item_error` and `scan_finished` events.
#[utoipa::path(
    post,
    path = "/scan/range",
    request_body = ScanRequest,
    responses(
        (status = 202, description = "Scan scheduled", body = ApiResponse<JobAccepted>),
        (status = 400, description = "Invalid range, timeout or operator")
    ),
    tag = "jobs"
)]
pub async fn start_range_scan(
    State(state): State<AppState>,
    Json(request): Json<ScanRequest>,
) -> AppResult<ApiResponse<JobAccepted>> {
    request.validate()?;
    let portal = state.portals.open(
        request.operator,
        CallSettings::new(request.timeout_secs, request.max_retries),
    )?;

    let job_id = state.jobs.create(JobKind::RangeScan).await;
    info!(
        %job_id,
        operator = %request.operator,
        start = request.start_id,
        end = request.end_id,
        "range scan accepted"
    );

    let dispatcher = state.notifier.dispatcher(request.webhook_url.clone());
    let events = dispatcher.sender();
    spawn_job(state.jobs.clone(), job_id, dispatcher, async move {
        let stats = run_scan(job_id, &request, portal.as_ref(), &events).await;
        JobStats::Scan(stats)
    });

    Ok(ApiResponse::accepted(JobAccepted::started(job_id)))
}
