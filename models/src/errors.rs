// models/src/errors.rs
use std::io;
pub use thiserror::Error;
use uuid::Error as UuidError;
use serde::{Serialize, Deserialize};
use serde_json::Error as SerdeJsonError;
use tokio::task::JoinError;

/// Error taxonomy shared by every component of the coordinator.
///
/// Callers group the variants into four classes: validation (caller-fixable),
/// authorization (wrong identity), not-found, and dependency failures
/// (pinning service or chain authority failed or timed out).
#[derive(Debug, Serialize, Deserialize, Error, Clone, PartialEq)]
pub enum LedgerError {
    #[error("{0}")]
    Validation(ValidationError),
    #[error("{0}")]
    Authorization(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Upstream dependency failed: {0}")]
    Dependency(String),
    #[error("Timeout error: {0}")]
    Timeout(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("An internal error occurred: {0}")]
    Internal(String),
}

impl LedgerError {
    /// True for failures of an external collaborator. These are safe for the
    /// caller to retry and are never retried internally.
    pub fn is_dependency_failure(&self) -> bool {
        matches!(self, LedgerError::Dependency(_) | LedgerError::Timeout(_))
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        LedgerError::NotFound(what.into())
    }

    pub fn unauthorized(why: impl Into<String>) -> Self {
        LedgerError::Authorization(why.into())
    }
}

impl From<ValidationError> for LedgerError {
    fn from(err: ValidationError) -> Self {
        LedgerError::Validation(err)
    }
}

impl From<tokio::time::error::Elapsed> for LedgerError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        LedgerError::Timeout("operation timed out".into())
    }
}

impl From<SerdeJsonError> for LedgerError {
    fn from(err: SerdeJsonError) -> Self {
        LedgerError::Serialization(format!("JSON serialization error: {}", err))
    }
}

impl From<JoinError> for LedgerError {
    fn from(err: JoinError) -> Self {
        LedgerError::Internal(format!("Task failed to join: {}", err))
    }
}

impl From<io::Error> for LedgerError {
    fn from(err: io::Error) -> Self {
        LedgerError::Io(err.to_string())
    }
}

impl From<UuidError> for LedgerError {
    fn from(err: UuidError) -> Self {
        LedgerError::Validation(ValidationError::InvalidRequestId(err.to_string()))
    }
}

#[cfg(feature = "http-errors")]
impl From<reqwest::Error> for LedgerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LedgerError::Timeout(format!("HTTP request timed out: {}", err))
        } else {
            LedgerError::Dependency(format!("HTTP request failed: {}", err))
        }
    }
}

#[cfg(feature = "sled-errors")]
impl From<sled::Error> for LedgerError {
    fn from(err: sled::Error) -> Self {
        LedgerError::Storage(format!("Sled error: {}", err))
    }
}

#[derive(Debug, Serialize, Deserialize, Error, PartialEq, Eq, Clone)]
pub enum ValidationError {
    #[error("Invalid {0}")]
    InvalidAddress(String),
    #[error("Invalid {0}")]
    InvalidTransactionHash(String),
    #[error("Invalid prescriptionId")]
    InvalidPrescriptionId,
    #[error("Invalid request id: {0}")]
    InvalidRequestId(String),
    #[error("Missing x-{0} header")]
    MissingHeader(String),
    #[error("Missing or invalid viewer address")]
    InvalidViewer,
    #[error("Missing payload")]
    MissingPayload,
    #[error("Payload title is required")]
    MissingTitle,
    #[error("Reason is required for access requests")]
    MissingReason,
    #[error("{0}")]
    MissingEvidence(String),
    #[error("Request kind must be 'prescription' or 'access'")]
    UnsupportedKind,
    #[error("Patch for a {patch} request cannot be applied to a {kind} request")]
    KindMismatch { kind: String, patch: String },
    #[error("Missing or invalid {0}")]
    InvalidDoctorAuthorization(String),
    #[error("Malformed request body: {0}")]
    MalformedBody(String),
    #[error("{0}")]
    InvalidMetric(String),
}

/// A type alias for a `Result` that returns a `LedgerError` on failure.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// A type alias for a `Result` that returns a `ValidationError` on failure.
pub type ValidationResult<T> = Result<T, ValidationError>;
