//! Unified error type for streaming turns.
//!
//! `ConvoError` consolidates the transport, protocol, stream and abort
//! errors into one enum so callers make retry and display decisions in a
//! single place.

use std::fmt;

use super::abort::AbortError;
use super::category::ErrorCategory;
use super::context::ErrorContext;
use super::protocol::ProtocolError;
use super::stream::StreamError;
use super::transport::TransportError;
use crate::config::ConfigError;
use crate::traits::HttpError;

/// Unified error type for a streaming turn.
#[derive(Debug)]
pub enum ConvoError {
    /// Network failure before any response byte.
    Transport(TransportError),

    /// Unusable response (status, content type, fallback body).
    Protocol(ProtocolError),

    /// Failure after the stream started.
    Stream(StreamError),

    /// Accepted cancellation.
    Abort(AbortError),

    /// Invalid configuration.
    Config(ConfigError),

    /// Wrapped error with additional context.
    WithContext {
        error: Box<ConvoError>,
        context: ErrorContext,
    },
}

impl ConvoError {
    /// Get the category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ConvoError::Transport(_) => ErrorCategory::Network,
            ConvoError::Protocol(ProtocolError::HttpStatus { status, .. }) if *status >= 500 => {
                ErrorCategory::Server
            }
            ConvoError::Protocol(_) => ErrorCategory::Protocol,
            ConvoError::Stream(StreamError::BackendError { .. }) => ErrorCategory::Server,
            ConvoError::Stream(_) => ErrorCategory::Network,
            ConvoError::Abort(_) => ErrorCategory::Cancelled,
            ConvoError::Config(_) => ErrorCategory::Configuration,
            ConvoError::WithContext { error, .. } => error.category(),
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            ConvoError::Transport(err) => err.is_retryable(),
            ConvoError::Protocol(err) => err.is_retryable(),
            ConvoError::Stream(err) => err.is_retryable(),
            ConvoError::Abort(_) | ConvoError::Config(_) => false,
            ConvoError::WithContext { error, .. } => error.is_retryable(),
        }
    }

    /// Whether this error should surface to the user. Aborts never do.
    pub fn is_user_visible(&self) -> bool {
        self.category().is_user_visible()
    }

    /// True for accepted cancellations.
    pub fn is_abort(&self) -> bool {
        matches!(self.inner(), ConvoError::Abort(_))
    }

    /// Get a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            ConvoError::Transport(err) => err.user_message(),
            ConvoError::Protocol(err) => err.user_message(),
            ConvoError::Stream(err) => err.user_message(),
            ConvoError::Abort(_) => "Request cancelled.".to_string(),
            ConvoError::Config(err) => format!("Configuration error: {}", err),
            ConvoError::WithContext { error, .. } => error.user_message(),
        }
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            ConvoError::Transport(err) => err.error_code(),
            ConvoError::Protocol(err) => err.error_code(),
            ConvoError::Stream(err) => err.error_code(),
            ConvoError::Abort(err) => err.error_code(),
            ConvoError::Config(_) => "E_CONFIG",
            ConvoError::WithContext { error, .. } => error.error_code(),
        }
    }

    /// Attach context to this error.
    pub fn with_context(self, ctx: ErrorContext) -> Self {
        ConvoError::WithContext {
            error: Box::new(self),
            context: ctx,
        }
    }

    /// Get the context if this error has one attached.
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            ConvoError::WithContext { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Get the inner error without context.
    pub fn inner(&self) -> &ConvoError {
        match self {
            ConvoError::WithContext { error, .. } => error.inner(),
            _ => self,
        }
    }

    /// Get the recovery hint for this error.
    pub fn recovery_hint(&self) -> &'static str {
        self.category().recovery_hint()
    }
}

impl fmt::Display for ConvoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvoError::Transport(err) => write!(f, "{}", err),
            ConvoError::Protocol(err) => write!(f, "{}", err),
            ConvoError::Stream(err) => write!(f, "{}", err),
            ConvoError::Abort(err) => write!(f, "{}", err),
            ConvoError::Config(err) => write!(f, "{}", err),
            ConvoError::WithContext { error, context } => {
                write!(f, "{} ({})", error, context)
            }
        }
    }
}

impl std::error::Error for ConvoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConvoError::Transport(err) => Some(err),
            ConvoError::Protocol(err) => Some(err),
            ConvoError::Stream(err) => Some(err),
            ConvoError::Abort(err) => Some(err),
            ConvoError::Config(err) => Some(err),
            ConvoError::WithContext { error, .. } => error.source(),
        }
    }
}

// ============================================================================
// From implementations for automatic error conversion
// ============================================================================

impl From<TransportError> for ConvoError {
    fn from(err: TransportError) -> Self {
        ConvoError::Transport(err)
    }
}

impl From<ProtocolError> for ConvoError {
    fn from(err: ProtocolError) -> Self {
        ConvoError::Protocol(err)
    }
}

impl From<StreamError> for ConvoError {
    fn from(err: StreamError) -> Self {
        ConvoError::Stream(err)
    }
}

impl From<AbortError> for ConvoError {
    fn from(err: AbortError) -> Self {
        ConvoError::Abort(err)
    }
}

impl From<ConfigError> for ConvoError {
    fn from(err: ConfigError) -> Self {
        ConvoError::Config(err)
    }
}

impl From<HttpError> for ConvoError {
    fn from(err: HttpError) -> Self {
        ConvoError::Transport(TransportError::from_http(err, "unknown"))
    }
}

impl From<serde_json::Error> for ConvoError {
    fn from(err: serde_json::Error) -> Self {
        ConvoError::Protocol(ProtocolError::InvalidFallbackBody {
            message: err.to_string(),
        })
    }
}
