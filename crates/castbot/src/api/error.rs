use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use thiserror::Error;

use castcore::core::error::{AppError, FieldErrors};

/// JSON error body: `{"error": "...", "details": {...}}`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<FieldErrors>,
}

/// Errors returned by dashboard handlers.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{message}")]
    Validation { message: String, fields: FieldErrors },

    #[error("{0}")]
    BadRequest(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Unauthorized")]
    Unauthorized,

    /// Logged with its cause; the client sees only the context.
    #[error("{context}: {source}")]
    Internal {
        context: &'static str,
        #[source]
        source: AppError,
    },
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Maps a core error, using `context` as the client-facing message for
    /// internal failures.
    pub fn from_core(context: &'static str, err: AppError) -> Self {
        match err {
            AppError::Validation { message, fields } => ApiError::Validation { message, fields },
            AppError::NotFound(what) => ApiError::NotFound(what),
            AppError::Conflict(message) => ApiError::BadRequest(message),
            source => ApiError::Internal { context, source },
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// `.context("Failed to ...")` for core results inside handlers.
pub trait CoreResultExt<T> {
    fn context(self, context: &'static str) -> ApiResult<T>;
}

impl<T> CoreResultExt<T> for Result<T, AppError> {
    fn context(self, context: &'static str) -> ApiResult<T> {
        self.map_err(|e| ApiError::from_core(context, e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Validation { message, fields } => ErrorResponse {
                error: message,
                details: Some(fields),
            },
            ApiError::Internal { context, source } => {
                log::error!("{}: {}", context, source);
                ErrorResponse {
                    error: context.to_string(),
                    details: None,
                }
            }
            other => ErrorResponse {
                error: other.to_string(),
                details: None,
            },
        };
        (status, Json(body)).into_response()
    }
}
