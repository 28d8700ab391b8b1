//! Error types for the HDHomeRun EPG pipeline
//!
//! This module defines all error types used throughout the library.
//! Fatal errors carry enough context for the caller to decide whether a
//! later retry is worthwhile; per-entry parse problems are not errors at
//! all and are handled by dropping or degrading the offending entry.

use thiserror::Error;

/// Error type for EPG pipeline operations
#[derive(Error, Debug)]
pub enum EpgError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// No HDHomeRun devices responded during discovery
    #[error("no HDHomeRun devices discovered (tried hosts: {0})")]
    NoDevicesDiscovered(String),

    /// Channel lineup could not be retrieved from the primary device
    #[error("channel lineup unavailable: {0}")]
    LineupUnavailable(String),

    /// Every guide endpoint and client identity was rejected for a window
    #[error("guide service rejected all endpoints and client identities")]
    AuthRejected,

    /// Guide service unreachable after exhausting endpoint fallback
    #[error("guide service unavailable: {0}")]
    GuideUnavailable(String),

    /// Unparsable JSON from an upstream call
    #[error("malformed response from {context}: {message}")]
    MalformedResponse {
        /// Which upstream call produced the response
        context: &'static str,
        /// Underlying parse failure
        message: String,
    },
}

impl EpgError {
    /// Build a `MalformedResponse` from a serde_json failure.
    pub(crate) fn malformed(context: &'static str, err: serde_json::Error) -> Self {
        EpgError::MalformedResponse {
            context,
            message: err.to_string(),
        }
    }
}

/// Result type alias for EPG pipeline operations
pub type Result<T> = std::result::Result<T, EpgError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_devices_display() {
        let error = EpgError::NoDevicesDiscovered("10.0.0.2, hdhomerun.local".to_string());
        let display = error.to_string();
        assert!(display.contains("no HDHomeRun devices discovered"));
        assert!(display.contains("10.0.0.2"));
    }

    #[test]
    fn test_lineup_unavailable_display() {
        let error = EpgError::LineupUnavailable("connection refused".to_string());
        assert_eq!(
            error.to_string(),
            "channel lineup unavailable: connection refused"
        );
    }

    #[test]
    fn test_auth_rejected_display() {
        let error = EpgError::AuthRejected;
        assert_eq!(
            error.to_string(),
            "guide service rejected all endpoints and client identities"
        );
    }

    #[test]
    fn test_guide_unavailable_display() {
        let error = EpgError::GuideUnavailable("HTTP 502".to_string());
        assert_eq!(error.to_string(), "guide service unavailable: HTTP 502");
    }

    #[test]
    fn test_malformed_response_display() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let error = EpgError::malformed("guide", err);
        let display = error.to_string();
        assert!(display.starts_with("malformed response from guide:"));
    }
}
