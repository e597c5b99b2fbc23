//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic business failures (validation,
/// compliance rejections, invariants). Infrastructure concerns belong
/// elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed record, unknown status code).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The extract is incompatible with the chosen depot context.
    ///
    /// Rejects the upload wholesale; there is no per-row filtering.
    #[error("depot context mismatch: {0}")]
    ContextMismatch(String),

    /// The extract contains lots under a blocking quarantine status.
    #[error("quarantined stock detected: {0}")]
    Quarantine(String),

    /// A domain invariant was violated (conservation, non-negativity).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested resource was not found (domain-level).
    #[error("not found")]
    NotFound,

    /// A conflict occurred (e.g. illegal workflow transition).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn context_mismatch(msg: impl Into<String>) -> Self {
        Self::ContextMismatch(msg.into())
    }

    pub fn quarantine(msg: impl Into<String>) -> Self {
        Self::Quarantine(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    /// True for the two fatal extract-rejection kinds. These abort the
    /// whole upload with no partial acceptance.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::ContextMismatch(_) | Self::Quarantine(_))
    }
}
