use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Convenient Result alias.
pub type AppResult<T> = Result<T, AppError>;

/// Field name to the validation messages raised for it.
pub type FieldErrors = BTreeMap<&'static str, Vec<String>>;

/// Application error type.
///
/// Every variant but `Internal` is an already-classified failure and is
/// rendered with its own status and message.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid request parameters")]
    InvalidFields(FieldErrors),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Method Not Allowed")]
    MethodNotAllowed,

    #[error("{0}")]
    ArchiveCorrupt(String),

    #[error("Unexpected error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InvalidFields(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::ArchiveCorrupt(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON error body shared by handlers, fallbacks and the panic catcher.
pub fn error_body(status: StatusCode, message: &str) -> serde_json::Value {
    json!({
        "ok": false,
        "code": status.as_u16(),
        "status": status.canonical_reason().unwrap_or("Error"),
        "message": message,
    })
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), "{}", message);
        } else {
            tracing::warn!(status = status.as_u16(), "{}", message);
        }

        let mut body = error_body(status, &message);
        if let Self::InvalidFields(fields) = &self {
            body["errors"] = json!(fields);
        }

        (status, axum::Json(body)).into_response()
    }
}
