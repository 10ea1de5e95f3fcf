use axum::{extract::State, response::Json};
use tracing::info;

use crate::{
    error::AppResult,
    handlers::AppState,
    models::{AuditBatchRequest, JobAccepted, JobKind, JobStats},
    response::ApiResponse,
    services::{CallSettings, run_audit_batch, spawn_job},
};

/// Start a background audit fetch for a list of ids
#[utoipa::path(
    post,
    path = "/audit/batch",
    request_body = AuditBatchRequest,
    responses(
        (status = 202, description = "Batch scheduled", body = ApiResponse<JobAccepted>),
        (status = 400, description = "Empty id list, bad cutoff or unknown operator")
    ),
    tag = "jobs"
)]
pub async fn start_audit_batch(
    State(state): State<AppState>,
    Json(request): Json<AuditBatchRequest>,
) -> AppResult<ApiResponse<JobAccepted>> {
    request.validate()?;
    let portal = state.portals.open(
        request.operator,
        CallSettings::new(request.timeout_secs, request.max_retries),
    )?;

    let job_id = state.jobs.create(JobKind::AuditBatch).await;
    info!(%job_id, operator = %request.operator, count = request.ids.len(), "audit batch accepted");

    let dispatcher = state.notifier.dispatcher(request.webhook_url.clone());
    let events = dispatcher.sender();
    spawn_job(state.jobs.clone(), job_id, dispatcher, async move {
        let stats = run_audit_batch(job_id, &request, portal.as_ref(), &events).await;
        JobStats::Audit(stats)
    });

    Ok(ApiResponse::accepted(JobAccepted::started(job_id)))
}
