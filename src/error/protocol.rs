//! Protocol errors: the server answered, but not with something usable.

use std::fmt;

/// Response this client cannot consume.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// Non-2xx status.
    HttpStatus { status: u16, message: String },

    /// 2xx without a `text/event-stream` body and no fallback to use.
    UnexpectedContentType { content_type: Option<String> },

    /// Fallback endpoint answered with something that is not a reply.
    InvalidFallbackBody { message: String },
}

impl ProtocolError {
    /// Server errors may succeed on a later attempt; the rest will not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProtocolError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Get a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            ProtocolError::HttpStatus { status, message } => {
                if message.is_empty() {
                    format!("The server returned an error (HTTP {}).", status)
                } else {
                    format!("The server returned an error (HTTP {}): {}", status, message)
                }
            }
            ProtocolError::UnexpectedContentType { .. } => {
                "The server did not start a stream. Please try again.".to_string()
            }
            ProtocolError::InvalidFallbackBody { .. } => {
                "The server answered in an unexpected format.".to_string()
            }
        }
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            ProtocolError::HttpStatus { .. } => "E_PROTO_STATUS",
            ProtocolError::UnexpectedContentType { .. } => "E_PROTO_CONTENT_TYPE",
            ProtocolError::InvalidFallbackBody { .. } => "E_PROTO_FALLBACK",
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::HttpStatus { status, message } => {
                write!(f, "HTTP {}: {}", status, message)
            }
            ProtocolError::UnexpectedContentType { content_type } => match content_type {
                Some(ct) => write!(f, "Expected text/event-stream, got {}", ct),
                None => write!(f, "Expected text/event-stream, got no content type"),
            },
            ProtocolError::InvalidFallbackBody { message } => {
                write!(f, "Invalid fallback body: {}", message)
            }
        }
    }
}

impl std::error::Error for ProtocolError {}
