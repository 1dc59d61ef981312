//! Error types for the job timer domain.

use thiserror::Error;

/// Errors raised while building or validating domain values.
#[derive(Debug, Error)]
pub enum TypesError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Trigger definition cannot produce fire times
    #[error("Invalid trigger: {0}")]
    InvalidTrigger(String),

    /// Unknown IANA zone id
    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    /// Malformed job definition
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TypesError::InvalidTimezone("Mars/Olympus".to_string());
        assert!(err.to_string().contains("Invalid timezone"));

        let err = TypesError::Validation("missing trigger".to_string());
        assert!(err.to_string().contains("missing trigger"));
    }
}
