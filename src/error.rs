//! Error types for the correction log
//!
//! Defines the error hierarchy for command parsing, evaluation, history
//! navigation, and log persistence. Every error surfaces immediately to
//! the caller; nothing is retried or silently recovered.

use thiserror::Error;

/// Top-level error type for all correction-log operations
#[derive(Debug, Error)]
pub enum CorrectionError {
    /// Malformed command text (unbalanced brackets, unterminated string,
    /// trailing tokens, dangling keyword)
    #[error("syntax error: {0}")]
    Syntax(String),

    /// Unknown operation or field name
    #[error("lookup error: {0}")]
    Lookup(String),

    /// A value or index failed validation before any mutation
    #[error("validation error: {0}")]
    Validation(String),

    /// Undo/redo/peek beyond the history buffer limits
    #[error("history error: {0}")]
    History(String),

    /// The bound event-data file no longer matches the recorded digest
    #[error("event file hash mismatch: expected {expected}, found {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    /// Log or metadata file access failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Metadata sidecar could not be read or written
    #[error("metadata error: {0}")]
    Metadata(#[from] serde_yaml::Error),
}

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, CorrectionError>;
