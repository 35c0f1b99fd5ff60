//! Abort errors: the turn was cancelled on purpose.

use std::fmt;

use crate::session::AbortReason;

/// An accepted cancellation. Callers identify it by reason and keep it out
/// of user-facing error channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbortError {
    pub reason: AbortReason,
}

impl AbortError {
    pub fn new(reason: AbortReason) -> Self {
        Self { reason }
    }

    pub fn error_code(&self) -> &'static str {
        match self.reason {
            AbortReason::UserCancel => "E_ABORT_USER",
            AbortReason::WatchdogTimeout => "E_ABORT_WATCHDOG",
            AbortReason::NewSend => "E_ABORT_SUPERSEDED",
        }
    }
}

impl fmt::Display for AbortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Aborted ({})", self.reason)
    }
}

impl std::error::Error for AbortError {}
