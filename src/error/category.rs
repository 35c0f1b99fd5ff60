//! Error category classification for unified error handling.
//!
//! Categories drive the two decisions callers make about a failed turn:
//! whether to retry it, and whether to show it to the user at all.

use std::fmt;

/// High-level categorization of errors for handling decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network-related errors (connection, DNS, timeout) before any byte
    /// of the response arrived. Generally transient and retryable.
    Network,

    /// Backend-side errors (HTTP 5xx, explicit `error` events).
    Server,

    /// The response was not something this client can read
    /// (wrong status class, wrong content type, unreadable fallback body).
    Protocol,

    /// The turn was cancelled on purpose. Never shown to the user.
    Cancelled,

    /// Client-side errors (bugs, invalid state).
    Client,

    /// Configuration errors (bad URL, malformed environment values).
    Configuration,
}

impl ErrorCategory {
    /// Returns true if errors in this category are generally transient
    /// and the operation can be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCategory::Network | ErrorCategory::Server)
    }

    /// Returns true if errors in this category should reach the user.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, ErrorCategory::Cancelled)
    }

    /// Returns a short label for the category suitable for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Server => "server",
            ErrorCategory::Protocol => "protocol",
            ErrorCategory::Cancelled => "cancelled",
            ErrorCategory::Client => "client",
            ErrorCategory::Configuration => "configuration",
        }
    }

    /// Returns a user-friendly description of the category.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "Network connectivity issue",
            ErrorCategory::Server => "Server-side issue",
            ErrorCategory::Protocol => "Unexpected server response",
            ErrorCategory::Cancelled => "Request cancelled",
            ErrorCategory::Client => "Application error",
            ErrorCategory::Configuration => "Configuration problem",
        }
    }

    /// Returns suggested recovery actions for this category.
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "Check your internet connection and try again",
            ErrorCategory::Server => {
                "The server may be experiencing issues. Please try again later"
            }
            ErrorCategory::Protocol => {
                "The server answered in an unexpected format. Please try again later"
            }
            ErrorCategory::Cancelled => "No action needed",
            ErrorCategory::Client => {
                "This may be a bug. Please report this issue if it persists"
            }
            ErrorCategory::Configuration => "Check your configuration settings",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_retryable() {
        assert!(ErrorCategory::Network.is_retryable());
        assert!(ErrorCategory::Server.is_retryable());
        assert!(!ErrorCategory::Protocol.is_retryable());
        assert!(!ErrorCategory::Cancelled.is_retryable());
        assert!(!ErrorCategory::Client.is_retryable());
        assert!(!ErrorCategory::Configuration.is_retryable());
    }

    #[test]
    fn test_cancelled_is_hidden() {
        assert!(!ErrorCategory::Cancelled.is_user_visible());
        assert!(ErrorCategory::Protocol.is_user_visible());
        assert!(ErrorCategory::Server.is_user_visible());
    }

    #[test]
    fn test_category_display() {
        assert_eq!(format!("{}", ErrorCategory::Network), "network");
        assert_eq!(format!("{}", ErrorCategory::Cancelled), "cancelled");
    }

    #[test]
    fn test_category_description() {
        assert!(ErrorCategory::Network.description().contains("Network"));
        assert!(ErrorCategory::Protocol.description().contains("response"));
    }
}
