//! Custom error types for the data-quality engine.
//!
//! This module provides the error hierarchy using `thiserror`. Malformed field
//! values never show up here: they are resolved into per-record flags by the
//! preprocessor. What remains are configuration errors, detector failures and
//! the usual IO/Polars wrappers.
//!
//! Errors are serializable so they can be handed to a reporting front end
//! as `{ "code": ..., "message": ... }`.

use crate::config::ConfigValidationError;
use crate::types::IssueType;
use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the quality pipeline.
#[derive(Error, Debug)]
pub enum QualityError {
    /// Pipeline was cancelled through its cancellation token.
    #[error("Quality run cancelled")]
    Cancelled,

    /// Column was not found in the dataset.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigValidationError),

    /// A detector could not produce its result set.
    ///
    /// This is never collapsed into an empty result, because an empty set
    /// means "nothing found".
    #[error("Detector '{issue}' failed: {reason}")]
    DetectorFailed { issue: IssueType, reason: String },

    /// Internal error (e.g., detector thread panicked).
    #[error("Internal error: {0}")]
    Internal(String),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<QualityError>,
    },
}

impl QualityError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        QualityError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Wrap any error raised while running a detector, tagging it with the
    /// issue type the detector owns.
    pub fn detector(issue: IssueType, reason: impl std::fmt::Display) -> Self {
        QualityError::DetectorFailed {
            issue,
            reason: reason.to_string(),
        }
    }

    /// Get error code for front-end handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Cancelled => "CANCELLED",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::DetectorFailed { .. } => "DETECTOR_FAILED",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error represents a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::WithContext { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// The issue type of the failing detector, if this is a detector failure.
    pub fn failed_issue(&self) -> Option<&IssueType> {
        match self {
            Self::DetectorFailed { issue, .. } => Some(issue),
            Self::WithContext { source, .. } => source.failed_issue(),
            _ => None,
        }
    }
}

impl Serialize for QualityError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("QualityError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for quality operations.
pub type Result<T> = std::result::Result<T, QualityError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| QualityError::Polars(e).with_context(context))
    }
}
