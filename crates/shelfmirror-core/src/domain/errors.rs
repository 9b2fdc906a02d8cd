//! Domain error types
//!
//! Errors produced by pure domain operations, currently the time-window
//! constructors.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A time window whose end does not lie strictly after its start
    #[error("Invalid time window: start {start} is not before end {end}")]
    InvalidWindow {
        /// Window start (inclusive)
        start: String,
        /// Window end (exclusive)
        end: String,
    },

    /// A step size below the minimum granularity
    #[error("Invalid step size: {0} minutes (minimum is 1)")]
    InvalidStep(i64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DomainError::InvalidStep(0);
        assert_eq!(err.to_string(), "Invalid step size: 0 minutes (minimum is 1)");

        let err = DomainError::InvalidWindow {
            start: "2024-01-02T00:00:00+00:00".to_string(),
            end: "2024-01-01T00:00:00+00:00".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid time window: start 2024-01-02T00:00:00+00:00 \
             is not before end 2024-01-01T00:00:00+00:00"
        );
    }

    #[test]
    fn test_error_equality() {
        assert_eq!(DomainError::InvalidStep(0), DomainError::InvalidStep(0));
        assert_ne!(DomainError::InvalidStep(0), DomainError::InvalidStep(-1));
    }
}
