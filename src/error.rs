// src/error.rs
//! Domain error types
//!
//! Every failure the workflow can surface to a user is one of these variants.
//! The API layer maps them onto HTTP status codes and uses `is_retriable` to
//! decide whether the client should offer a "try again" action.

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum InsightError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication required: {0}")]
    Authentication(String),

    #[error("Storage upload failed: {0}")]
    StorageUpload(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Analysis failed: {0}")]
    Analysis(String),

    #[error("Analysis timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl InsightError {
    /// Whether repeating the same request may succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            InsightError::Analysis(_)
                | InsightError::Timeout(_)
                | InsightError::StorageUpload(_)
                | InsightError::Database(_)
        )
    }

    /// Short machine-readable code, used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            InsightError::Validation(_) => "VALIDATION_ERROR",
            InsightError::Authentication(_) => "AUTHENTICATION_ERROR",
            InsightError::StorageUpload(_) => "STORAGE_UPLOAD_ERROR",
            InsightError::Database(_) => "DATABASE_ERROR",
            InsightError::DocumentNotFound(_) => "DOCUMENT_NOT_FOUND",
            InsightError::ProjectNotFound(_) => "PROJECT_NOT_FOUND",
            InsightError::Analysis(_) => "ANALYSIS_ERROR",
            InsightError::Timeout(_) => "TIMEOUT",
            InsightError::Config(_) => "CONFIG_ERROR",
            InsightError::Conflict(_) => "CONFLICT",
        }
    }
}

impl From<std::io::Error> for InsightError {
    fn from(err: std::io::Error) -> Self {
        InsightError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for InsightError {
    fn from(err: serde_json::Error) -> Self {
        InsightError::Database(format!("invalid stored JSON: {}", err))
    }
}

pub type InsightResult<T> = Result<T, InsightError>;
