//! Result type alias for streaming operations.

use super::context::ErrorContext;
use super::convo_error::ConvoError;
use crate::traits::HttpError;

/// Type alias for Results using ConvoError.
pub type ConvoResult<T> = Result<T, ConvoError>;

/// Extension trait for Result types to add context to errors.
pub trait ResultExt<T> {
    /// Add context to an error if the result is Err.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use convo_stream::error::{ErrorContext, ResultExt};
    ///
    /// let reply = parse_reply(body)
    ///     .context(ErrorContext::new("fallback").with_client_message_id(&id))?;
    /// ```
    fn context(self, ctx: ErrorContext) -> ConvoResult<T>;

    /// Add context using a closure (only called on error).
    fn with_context<F>(self, f: F) -> ConvoResult<T>
    where
        F: FnOnce() -> ErrorContext;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<ConvoError>,
{
    fn context(self, ctx: ErrorContext) -> ConvoResult<T> {
        self.map_err(|e| e.into().with_context(ctx))
    }

    fn with_context<F>(self, f: F) -> ConvoResult<T>
    where
        F: FnOnce() -> ErrorContext,
    {
        self.map_err(|e| e.into().with_context(f()))
    }
}

/// Map an adapter error for a request to `url` into a transport error.
pub fn transport_error(err: HttpError, url: &str) -> ConvoError {
    ConvoError::Transport(super::transport::TransportError::from_http(err, url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCategory, StreamError};

    #[test]
    fn test_context_on_domain_error() {
        fn might_fail() -> Result<i32, StreamError> {
            Err(StreamError::ConnectionLost {
                message: "reset".to_string(),
            })
        }

        let err = might_fail()
            .context(ErrorContext::new("read_body"))
            .unwrap_err();
        assert_eq!(err.context().unwrap().operation, "read_body");
        assert_eq!(err.category(), ErrorCategory::Network);
    }

    #[test]
    fn test_with_context_is_lazy() {
        let ok: Result<i32, serde_json::Error> = Ok(1);
        let value = ok
            .with_context(|| panic!("context built for Ok"))
            .unwrap();
        assert_eq!(value, 1);
    }

    #[test]
    fn test_transport_error_keeps_url() {
        let err = transport_error(HttpError::Timeout("5s".to_string()), "http://x/v1/ask");
        assert!(err.to_string().contains("http://x/v1/ask"));
    }
}
