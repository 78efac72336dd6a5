use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a node failure. Drives the retry/escalation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Network, timeout or rate-limit failure from an advisor.
    Transient,
    /// Malformed or inconsistent extracted/derived data.
    DataValidation,
    /// Programming or contract violation.
    Structural,
    /// Anything that could not be classified.
    Unknown,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Transient => "transient",
            ErrorKind::DataValidation => "data_validation",
            ErrorKind::Structural => "structural",
            ErrorKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Error returned by an external advisor call.
#[derive(Debug, Clone, Error)]
#[error("{kind} advisor error: {message}")]
pub struct AdvisorError {
    pub kind: ErrorKind,
    pub message: String,
}

impl AdvisorError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }

    pub fn data_validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DataValidation, message)
    }

    pub fn structural(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Structural, message)
    }

    /// A call that exceeded its deadline. Timeouts are always transient.
    pub fn timeout(advisor: &str) -> Self {
        Self::transient(format!("{advisor} call timed out"))
    }
}

/// Errors from repository operations (used by trait definitions in arflow-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}
