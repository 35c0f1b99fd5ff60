//! Unified error handling for streaming turns.
//!
//! - **Error Categories**: high-level classification for retry and display
//! - **Domain errors**: Transport, Protocol, Stream and Abort
//! - **Unified Error Type**: `ConvoError` consolidates them
//! - **Error Context**: operation and turn attached to errors
//! - **Result Type Alias**: `ConvoResult<T>`
//!
//! # Error Categories
//!
//! | Category | Description | Retryable | Shown |
//! |----------|-------------|-----------|-------|
//! | Network | Connection, timeout, dropped body | Yes | Yes |
//! | Server | 5xx, backend `error` event | Yes | Yes |
//! | Protocol | Wrong status class or content type | No | Yes |
//! | Cancelled | Accepted abort | No | No |
//! | Client | Programming errors | No | Yes |
//! | Configuration | Bad settings | No | Yes |
//!
//! A turn that reached `done` without any token is not an error: it is
//! reported through `StreamOutcome::no_text_received`.

mod abort;
mod category;
mod context;
mod convo_error;
mod protocol;
mod result;
mod stream;
mod transport;

// Re-export all public types
pub use abort::AbortError;
pub use category::ErrorCategory;
pub use context::ErrorContext;
pub use convo_error::ConvoError;
pub use protocol::ProtocolError;
pub use result::{transport_error, ConvoResult, ResultExt};
pub use stream::StreamError;
pub use transport::TransportError;

#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::session::AbortReason;

    /// Only protocol, stream and transport errors reach the user.
    #[test]
    fn test_visibility_policy() {
        let visible: Vec<ConvoError> = vec![
            ProtocolError::HttpStatus {
                status: 404,
                message: "not found".to_string(),
            }
            .into(),
            StreamError::BackendError {
                code: None,
                message: "x".to_string(),
            }
            .into(),
            TransportError::Timeout {
                url: "http://x".to_string(),
            }
            .into(),
        ];
        for err in visible {
            assert!(err.is_user_visible(), "{:?}", err);
            assert!(!err.user_message().is_empty());
            assert!(!err.error_code().is_empty());
        }

        for reason in [
            AbortReason::UserCancel,
            AbortReason::WatchdogTimeout,
            AbortReason::NewSend,
        ] {
            let err: ConvoError = AbortError::new(reason).into();
            assert!(!err.is_user_visible());
        }
    }
}
