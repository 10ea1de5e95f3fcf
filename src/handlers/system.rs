use axum::response::Json;
use serde_json::{Value as JsonValue, json};
use utoipa::OpenApi;

use crate::{docs::ApiDoc, response::ApiResponse};

/// Liveness probe
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up")),
    tag = "system"
)]
pub async fn health_check() -> Json<ApiResponse<JsonValue>> {
    Json(ApiResponse::success(json!({"status": "ok"})))
}

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
