//! Error types for the synchronization core.
//!
//! All storage and network failures propagate to the caller unwrapped; this
//! layer never retries silently. Absence (no escrowed secret, no existing
//! document) is a normal outcome and is modeled as `Option`, never as an
//! error variant.

use thiserror::Error;

/// Errors surfaced by the synchronization core.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Identity authentication failed or an operation required an
    /// authenticated session.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Writing the escrowed seed to the identity provider failed.
    ///
    /// The write is not safe to retry blindly; retries must be
    /// caller-initiated and explicit.
    #[error("escrow write failed: {0}")]
    EscrowWrite(String),

    /// An escrow slot exists but could not be decrypted (wrong identity or
    /// corrupted blob).
    #[error("escrow decrypt failed: {0}")]
    EscrowDecrypt(String),

    /// A document read or write against the key-value store failed.
    #[error("repository operation failed: {0}")]
    Repository(String),

    /// A public-index composite key could not be split into author and trip
    /// name. Should not occur for well-formed entries.
    #[error("malformed composite key: {0}")]
    MalformedKey(String),

    /// An operation required a derived key pair but none is cached for this
    /// session and none was enrolled.
    #[error("no key pair enrolled for this session")]
    NotEnrolled,

    /// The named trip does not exist in the collection.
    #[error("trip not found: {0}")]
    TripNotFound(String),

    /// The presented input is not valid for the requested operation.
    #[error("invalid input '{parameter}': {reason}")]
    InvalidInput {
        /// Name of the invalid parameter.
        parameter: String,
        /// Description of the issue.
        reason: String,
    },
}

impl SyncError {
    /// Creates an authentication error.
    #[must_use]
    pub fn authentication<S: Into<String>>(message: S) -> Self {
        Self::Authentication(message.into())
    }

    /// Creates an escrow write error.
    #[must_use]
    pub fn escrow_write<S: Into<String>>(message: S) -> Self {
        Self::EscrowWrite(message.into())
    }

    /// Creates an escrow decrypt error.
    #[must_use]
    pub fn escrow_decrypt<S: Into<String>>(message: S) -> Self {
        Self::EscrowDecrypt(message.into())
    }

    /// Creates a repository error.
    #[must_use]
    pub fn repository<S: Into<String>>(message: S) -> Self {
        Self::Repository(message.into())
    }

    /// Creates an invalid input error.
    #[must_use]
    pub fn invalid_input<P: Into<String>, R: Into<String>>(parameter: P, reason: R) -> Self {
        Self::InvalidInput {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for synchronization core operations.
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SyncError::invalid_input("name", "must not be empty");
        assert_eq!(format!("{err}"), "invalid input 'name': must not be empty");

        let err = SyncError::NotEnrolled;
        assert!(format!("{err}").contains("no key pair enrolled"));

        let err = SyncError::TripNotFound("morning-fog-canyon".to_string());
        assert!(format!("{err}").contains("morning-fog-canyon"));
    }
}
