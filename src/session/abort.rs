//! Abort coordination for one streaming turn.
//!
//! An [`AbortController`] wraps a `CancellationToken` and records *why* it was
//! cancelled. Only a short allow-list of string reasons may trigger it, so
//! unrelated code paths cannot abort a live stream by accident.

use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, info, warn};

/// Why a turn was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AbortReason {
    /// A stall detector gave up on the stream
    WatchdogTimeout,
    /// The caller cancelled the turn
    UserCancel,
    /// A newer send for the same client message id superseded this one
    NewSend,
}

impl AbortReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AbortReason::WatchdogTimeout => "watchdog_timeout",
            AbortReason::UserCancel => "user_cancel",
            AbortReason::NewSend => "new-send",
        }
    }

    /// Reasons string callers are allowed to abort with.
    ///
    /// `new-send` is absent: supersession goes through
    /// [`AbortController::abort_with`].
    pub fn from_allowed(reason: &str) -> Option<Self> {
        match reason {
            "watchdog_timeout" => Some(AbortReason::WatchdogTimeout),
            "user_cancel" => Some(AbortReason::UserCancel),
            _ => None,
        }
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of an abort request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortOutcome {
    /// This call cancelled the controller
    Aborted,
    /// The controller was already cancelled; nothing happened
    AlreadyAborted,
    /// Reason not on the allow-list; nothing happened
    Rejected,
}

/// Cancellation handle for one turn (or one request inside it).
///
/// Clones share the same token and reason.
#[derive(Debug, Clone)]
pub struct AbortController {
    token: CancellationToken,
    reason: Arc<OnceCell<AbortReason>>,
    parent: Option<Arc<OnceCell<AbortReason>>>,
}

impl AbortController {
    /// Root controller, not linked to any other signal.
    pub fn new() -> Self {
        Self::from_token(CancellationToken::new())
    }

    /// Controller that is also cancelled when `signal` is.
    ///
    /// This is how a caller-supplied signal merges with the internal one:
    /// cancelling either side cancels the turn, but aborting the controller
    /// never cancels the caller's token.
    pub fn linked_to(signal: &CancellationToken) -> Self {
        Self::from_token(signal.child_token())
    }

    fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            reason: Arc::new(OnceCell::new()),
            parent: None,
        }
    }

    /// Child controller: aborted with this one, abortable on its own.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            reason: Arc::new(OnceCell::new()),
            parent: Some(Arc::clone(&self.reason)),
        }
    }

    /// Abort with a string reason, honoring the allow-list.
    pub fn abort(&self, reason: &str) -> AbortOutcome {
        match AbortReason::from_allowed(reason) {
            Some(reason) => self.abort_with(reason),
            None => {
                warn!("Ignoring abort with unlisted reason '{}'", reason);
                AbortOutcome::Rejected
            }
        }
    }

    /// Abort with a typed reason. Idempotent.
    pub fn abort_with(&self, reason: AbortReason) -> AbortOutcome {
        if self.token.is_cancelled() {
            debug!("Abort ({}) on an already aborted controller", reason);
            return AbortOutcome::AlreadyAborted;
        }
        if self.reason.set(reason).is_err() {
            return AbortOutcome::AlreadyAborted;
        }
        info!("Aborting stream: {}", reason);
        self.token.cancel();
        AbortOutcome::Aborted
    }

    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Recorded reason, inherited from the parent controller if needed.
    ///
    /// `None` while live, and when cancellation came from a linked caller
    /// signal rather than an abort call.
    pub fn reason(&self) -> Option<AbortReason> {
        self.reason
            .get()
            .copied()
            .or_else(|| self.parent.as_ref().and_then(|p| p.get().copied()))
    }

    /// Reason to report for a cancelled controller. A linked caller signal
    /// counts as the user cancelling.
    pub fn effective_reason(&self) -> AbortReason {
        self.reason().unwrap_or(AbortReason::UserCancel)
    }

    /// Future resolving once the controller is aborted.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Default for AbortController {
    fn default() -> Self {
        Self::new()
    }
}
