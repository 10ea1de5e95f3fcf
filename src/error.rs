use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::response::{ApiResponse, ResponseCode};

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Connection refused/reset, timeout or a non-2xx status from a remote host
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote answered with a shape that breaks the page-method contract
    #[error("protocol violation in {step}: {detail}")]
    Protocol { step: &'static str, detail: String },

    /// `Encryptar` answered with something other than a `?enc=` query
    #[error("Encryptar returned an unexpected payload: {0}")]
    UnexpectedToken(serde_json::Value),

    #[error("unknown operator: {0}")]
    UnknownOperator(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("resource not found: {resource}")]
    NotFound { resource: String },
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (code, message) = match &self {
            AppError::Transport(_) | AppError::Protocol { .. } | AppError::UnexpectedToken(_) => {
                (ResponseCode::UPSTREAM_ERROR, self.to_string())
            }
            AppError::UnknownOperator(_) => (ResponseCode::BAD_REQUEST, self.to_string()),
            AppError::Serialization(_) | AppError::Io(_) | AppError::Config(_) => (
                ResponseCode::INTERNAL_ERROR,
                ResponseCode::get_message(ResponseCode::INTERNAL_ERROR).to_string(),
            ),
            AppError::Validation(msg) => (ResponseCode::BAD_REQUEST, msg.clone()),
            AppError::Internal(_) => (
                ResponseCode::INTERNAL_ERROR,
                ResponseCode::get_message(ResponseCode::INTERNAL_ERROR).to_string(),
            ),
            AppError::NotFound { resource } => {
                (ResponseCode::NOT_FOUND, format!("resource not found: {}", resource))
            }
        };

        tracing::error!("application error: {}", self);

        ApiResponse::<()>::error(code, message).into_response()
    }
}

/// Application Result alias
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn transport<T: Into<String>>(msg: T) -> Self {
        Self::Transport(msg.into())
    }

    pub fn protocol<T: Into<String>>(step: &'static str, detail: T) -> Self {
        Self::Protocol {
            step,
            detail: detail.into(),
        }
    }

    pub fn unknown_operator<T: Into<String>>(tag: T) -> Self {
        Self::UnknownOperator(tag.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found<T: Into<String>>(resource: T) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn config<T: Into<String>>(msg: T) -> Self {
        Self::Config(msg.into())
    }

    /// Only transport failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Transport(_))
    }
}
