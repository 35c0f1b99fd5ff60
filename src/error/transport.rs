//! Transport errors: failures before any response byte was received.

use std::fmt;

use crate::traits::HttpError;

/// Network failure before the response started.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportError {
    /// Could not reach the server.
    ConnectionFailed { url: String, message: String },

    /// The request did not complete in time.
    Timeout { url: String },

    /// The URL could not be used.
    InvalidUrl { url: String },

    /// The body stream failed mid-read for a non-abort reason.
    ReadFailed { message: String },

    /// Any other request failure.
    RequestFailed { message: String },
}

impl TransportError {
    /// Build from an adapter error for a request to `url`.
    pub fn from_http(err: HttpError, url: &str) -> Self {
        match err {
            HttpError::ConnectionFailed(message) => TransportError::ConnectionFailed {
                url: url.to_string(),
                message,
            },
            HttpError::Timeout(_) => TransportError::Timeout {
                url: url.to_string(),
            },
            HttpError::InvalidUrl(_) => TransportError::InvalidUrl {
                url: url.to_string(),
            },
            HttpError::Io(message) => TransportError::ReadFailed { message },
            HttpError::Cancelled => TransportError::RequestFailed {
                message: "request cancelled".to_string(),
            },
            HttpError::Other(message) => TransportError::RequestFailed { message },
        }
    }

    /// Check if this error is likely transient and can be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::ConnectionFailed { .. }
                | TransportError::Timeout { .. }
                | TransportError::ReadFailed { .. }
        )
    }

    /// Get a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            TransportError::ConnectionFailed { .. } => {
                "Could not reach the server. Check your connection and try again.".to_string()
            }
            TransportError::Timeout { .. } => {
                "The server took too long to answer. Please try again.".to_string()
            }
            TransportError::InvalidUrl { url } => format!("Invalid server address: {}", url),
            TransportError::ReadFailed { .. } => {
                "The connection dropped while receiving the answer.".to_string()
            }
            TransportError::RequestFailed { message } => format!("Request failed: {}", message),
        }
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            TransportError::ConnectionFailed { .. } => "E_NET_CONN",
            TransportError::Timeout { .. } => "E_NET_TIMEOUT",
            TransportError::InvalidUrl { .. } => "E_NET_URL",
            TransportError::ReadFailed { .. } => "E_NET_READ",
            TransportError::RequestFailed { .. } => "E_NET_REQUEST",
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::ConnectionFailed { url, message } => {
                write!(f, "Connection to {} failed: {}", url, message)
            }
            TransportError::Timeout { url } => write!(f, "Request to {} timed out", url),
            TransportError::InvalidUrl { url } => write!(f, "Invalid URL: {}", url),
            TransportError::ReadFailed { message } => write!(f, "Body read failed: {}", message),
            TransportError::RequestFailed { message } => write!(f, "Request failed: {}", message),
        }
    }
}

impl std::error::Error for TransportError {}
