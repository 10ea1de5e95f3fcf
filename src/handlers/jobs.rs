use axum::extract::{Path, State};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    handlers::AppState,
    models::Job,
    response::ApiResponse,
};

/// Completion state of a submitted job
///
/// Pending jobs report `done: false` and no stats; there are no in-flight counters.
#[utoipa::path(
    get,
    path = "/jobs/{job_id}",
    params(("job_id" = Uuid, Path, description = "Identifier returned at submission")),
    responses(
        (status = 200, description = "Job found", body = ApiResponse<Job>),
        (status = 404, description = "Unknown job")
    ),
    tag = "jobs"
)]
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> AppResult<ApiResponse<Job>> {
    let job = state
        .jobs
        .get(job_id)
        .await
        .ok_or_else(|| AppError::not_found(format!("job {}", job_id)))?;
    Ok(ApiResponse::success(job))
}
