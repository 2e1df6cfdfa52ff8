//! Error types for Tally
//!
//! Provides a unified error type for metering and reporting operations

use thiserror::Error;

/// Result type alias using TallyError
pub type Result<T> = std::result::Result<T, TallyError>;

/// Unified error type for Tally operations
#[derive(Debug, Error)]
pub enum TallyError {
    // Storage errors (load/save of the metrics document)
    #[error("Storage error: {0}")]
    Storage(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Invalid input to a metering call
    #[error("Validation error: {0}")]
    Validation(String),

    // Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TallyError {
    /// Whether this error came from the storage collaborator
    pub fn is_storage(&self) -> bool {
        matches!(self, TallyError::Storage(_) | TallyError::Serialization(_))
    }
}

impl From<serde_json::Error> for TallyError {
    fn from(err: serde_json::Error) -> Self {
        TallyError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for TallyError {
    fn from(err: std::io::Error) -> Self {
        TallyError::Storage(err.to_string())
    }
}

impl From<anyhow::Error> for TallyError {
    fn from(err: anyhow::Error) -> Self {
        TallyError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TallyError::Storage("disk full".to_string());
        assert_eq!(err.to_string(), "Storage error: disk full");
        assert!(err.is_storage());
    }

    #[test]
    fn test_io_error_maps_to_storage() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: TallyError = io.into();
        assert!(matches!(err, TallyError::Storage(_)));
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_validation_is_not_storage() {
        let err = TallyError::Validation("user agent is required".into());
        assert!(!err.is_storage());
    }
}
