//! Streaming-related error types.
//!
//! Errors raised after the stream started: explicit backend `error` events
//! and lost connections.

use std::fmt;

/// Stream-specific error variants.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamError {
    /// Backend reported an error via SSE.
    BackendError {
        code: Option<String>,
        message: String,
    },

    /// Stream connection was lost unexpectedly.
    ConnectionLost { message: String },

    /// No data arrived within the watchdog window and no fallback ran.
    Stalled { reason: String },
}

impl StreamError {
    /// Check if this error is likely transient and can be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StreamError::ConnectionLost { .. } | StreamError::Stalled { .. }
        )
    }

    /// Get a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            StreamError::BackendError { message, .. } => format!("Server error: {}", message),
            StreamError::ConnectionLost { .. } => {
                "Connection to the server was lost.".to_string()
            }
            StreamError::Stalled { .. } => {
                "The server stopped responding. Please try again.".to_string()
            }
        }
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            StreamError::BackendError { .. } => "E_STREAM_BACKEND",
            StreamError::ConnectionLost { .. } => "E_STREAM_CONN",
            StreamError::Stalled { .. } => "E_STREAM_STALLED",
        }
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::BackendError { code, message } => match code {
                Some(c) => write!(f, "Backend error [{}]: {}", c, message),
                None => write!(f, "Backend error: {}", message),
            },
            StreamError::ConnectionLost { message } => {
                write!(f, "Stream connection lost: {}", message)
            }
            StreamError::Stalled { reason } => write!(f, "Stream stalled ({})", reason),
        }
    }
}

impl std::error::Error for StreamError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_display() {
        let err = StreamError::BackendError {
            code: Some("rate_limit".to_string()),
            message: "slow down".to_string(),
        };
        assert_eq!(err.to_string(), "Backend error [rate_limit]: slow down");
        assert!(!err.is_retryable());
        assert_eq!(err.user_message(), "Server error: slow down");
    }

    #[test]
    fn test_connection_lost_is_retryable() {
        let err = StreamError::ConnectionLost {
            message: "reset".to_string(),
        };
        assert!(err.is_retryable());
        assert_eq!(err.error_code(), "E_STREAM_CONN");
    }
}
