//! Quota Error Types
//!
//! Errors surfaced by record stores, policy validation and the quota manager.
//! The gate itself never fails.

use std::path::PathBuf;

/// Result type alias for quota operations
pub type QuotaResult<T> = Result<T, QuotaError>;

/// Error types for quota operations
#[derive(Debug, thiserror::Error)]
pub enum QuotaError {
    /// Persisted record could not be trusted
    #[error("Corrupt usage record for user '{user_id}': {reason}")]
    CorruptRecord { user_id: String, reason: String },

    /// User id cannot be used as a store key
    #[error("Invalid user id: {0:?}")]
    InvalidUserId(String),

    /// Policy values that would break the cap arithmetic
    #[error("Invalid quota policy: {0}")]
    InvalidPolicy(String),

    /// Filesystem failure in a store backend
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Record could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl QuotaError {
    /// Build a corrupt-record error
    pub fn corrupt(user_id: &str, reason: impl Into<String>) -> Self {
        QuotaError::CorruptRecord {
            user_id: user_id.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the error means the stored record itself is bad
    pub fn is_corrupt(&self) -> bool {
        matches!(self, QuotaError::CorruptRecord { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corrupt_display() {
        let err = QuotaError::corrupt("user-1", "event with zero units");
        assert!(err.is_corrupt());
        assert_eq!(
            err.to_string(),
            "Corrupt usage record for user 'user-1': event with zero units"
        );
    }

    #[test]
    fn test_io_error_is_not_corrupt() {
        let err = QuotaError::Io {
            path: PathBuf::from("/tmp/x.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(!err.is_corrupt());
        assert!(err.to_string().contains("denied"));
    }
}
