use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Unified API response envelope
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Business response code
    pub code: i32,
    /// Human readable message
    pub msg: String,
    /// Response payload
    pub data: Option<T>,
}

impl<T> ApiResponse<T>
where
    T: Serialize,
{
    pub fn success(data: T) -> Self {
        Self {
            code: ResponseCode::SUCCESS,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }

    /// Work was scheduled in the background
    pub fn accepted(data: T) -> Self {
        Self {
            code: ResponseCode::ACCEPTED,
            msg: "accepted".to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: i32, msg: String) -> ApiResponse<()> {
        ApiResponse {
            code,
            msg,
            data: None,
        }
    }
}

impl<T> IntoResponse for ApiResponse<T>
where
    T: Serialize,
{
    fn into_response(self) -> Response {
        // HTTP status follows the business code
        let status = match self.code {
            ResponseCode::SUCCESS => StatusCode::OK,
            ResponseCode::ACCEPTED => StatusCode::ACCEPTED,
            ResponseCode::BAD_REQUEST => StatusCode::BAD_REQUEST,
            ResponseCode::NOT_FOUND => StatusCode::NOT_FOUND,
            ResponseCode::UPSTREAM_ERROR => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

/// Business response codes
pub struct ResponseCode;

impl ResponseCode {
    pub const SUCCESS: i32 = 200;
    pub const ACCEPTED: i32 = 202;

    pub const BAD_REQUEST: i32 = 400;
    pub const NOT_FOUND: i32 = 404;

    pub const INTERNAL_ERROR: i32 = 500;
    pub const UPSTREAM_ERROR: i32 = 502;
}

impl ResponseCode {
    pub fn get_message(code: i32) -> &'static str {
        match code {
            Self::SUCCESS => "ok",
            Self::ACCEPTED => "accepted",
            Self::BAD_REQUEST => "bad request",
            Self::NOT_FOUND => "resource not found",
            Self::INTERNAL_ERROR => "internal server error",
            Self::UPSTREAM_ERROR => "upstream portal error",
            _ => "unknown error",
        }
    }
}
