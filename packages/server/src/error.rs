use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use studio::StudioError;

/// Structured error response returned by all endpoints on failure.
#[derive(Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code. One of: `VALIDATION_ERROR`, `USER_MISSING`,
    /// `PERMISSION_DENIED`, `NOT_FOUND`, `INVALID_FORMAT`, `QUOTA_EXCEEDED`,
    /// `INTERNAL_ERROR`.
    pub code: &'static str,
    /// Human-readable error description.
    pub message: String,
}

/// Application-level error type.
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    UserMissing,
    PermissionDenied,
    NotFound(String),
    InvalidFormat(String),
    QuotaExceeded(String),
    Internal(String),
}

impl AppError {
    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        match self {
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "VALIDATION_ERROR",
                    message: msg,
                },
            ),
            AppError::UserMissing => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "USER_MISSING",
                    message: "The X-User-Id header is required".into(),
                },
            ),
            AppError::PermissionDenied => (
                StatusCode::FORBIDDEN,
                ErrorBody {
                    code: "PERMISSION_DENIED",
                    message: "Insufficient permissions".into(),
                },
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    code: "NOT_FOUND",
                    message: msg,
                },
            ),
            AppError::InvalidFormat(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorBody {
                    code: "INVALID_FORMAT",
                    message: msg,
                },
            ),
            AppError::QuotaExceeded(msg) => (
                StatusCode::INSUFFICIENT_STORAGE,
                ErrorBody {
                    code: "QUOTA_EXCEEDED",
                    message: msg,
                },
            ),
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        code: "INTERNAL_ERROR",
                        message: "An unexpected error occurred".into(),
                    },
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}

impl From<StudioError> for AppError {
    fn from(err: StudioError) -> Self {
        if err.is_quota_exceeded() {
            tracing::warn!("Storage quota exceeded: {err}");
            return AppError::QuotaExceeded(err.to_string());
        }
        match err {
            StudioError::InvalidFormat(msg) => AppError::InvalidFormat(msg),
            StudioError::ProjectNotFound(id) => {
                AppError::NotFound(format!("Project '{id}' not found"))
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}
