use std::collections::BTreeMap;

use thiserror::Error;

use crate::gateway::GatewayError;

/// Field name -> human readable problems, serialized as the `details` object
/// of a 400 response.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Centralized error type for the core library
///
/// Storage, dispatch and registration all return this enum; the HTTP layer
/// maps each variant to a status code.
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Database connection pool errors
    #[error("Database pool error: {0}")]
    DatabasePool(#[from] r2d2::Error),

    /// Schema migration errors
    #[error("Migration error: {0}")]
    Migration(String),

    /// Messaging gateway errors
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// JSON (de)serialization of stored blobs
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Payload failed validation; carries per-field detail
    #[error("Validation error: {message}")]
    Validation { message: String, fields: FieldErrors },

    /// Unknown id
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Request is well-formed but not allowed in the current state
    #[error("{0}")]
    Conflict(String),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Builds a validation error from collected field errors.
    pub fn validation(message: impl Into<String>, fields: FieldErrors) -> Self {
        AppError::Validation {
            message: message.into(),
            fields,
        }
    }

    /// True for errors that originate in the ledger itself (as opposed to
    /// the caller's input).
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            AppError::Database(_) | AppError::DatabasePool(_) | AppError::Migration(_) | AppError::Io(_)
        )
    }

    /// True when a write referenced a row that no longer exists.
    pub fn is_foreign_key_violation(&self) -> bool {
        matches!(
            self,
            AppError::Database(rusqlite::Error::SqliteFailure(e, _))
                if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY
        )
    }
}

/// Collects field errors while validating a payload.
#[derive(Debug, Default)]
pub struct Validator {
    fields: FieldErrors,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a problem with `field`.
    pub fn reject(&mut self, field: &str, problem: impl Into<String>) {
        self.fields.entry(field.to_string()).or_default().push(problem.into());
    }

    /// Requires a non-blank string of at most `max_chars` characters.
    pub fn text(&mut self, field: &str, value: &str, max_chars: usize) {
        if value.trim().is_empty() {
            self.reject(field, format!("{} is required", field));
        } else if value.chars().count() > max_chars {
            self.reject(field, format!("{} must be at most {} characters", field, max_chars));
        }
    }

    /// Finishes validation, returning the collected errors if any.
    pub fn finish(self, message: &str) -> AppResult<()> {
        if self.fields.is_empty() {
            Ok(())
        } else {
            Err(AppError::validation(message, self.fields))
        }
    }
}
