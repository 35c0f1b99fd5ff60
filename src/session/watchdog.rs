//! Stall watchdogs.
//!
//! A [`Watchdog`] is a single re-armable deadline owned by the session. The
//! session polls [`Watchdog::deadline`] inside its `select!` loop and calls
//! [`Watchdog::fire`] when it passes; there are no detached timer tasks, so
//! nothing can outlive the session or fire twice.

use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Why a watchdog went off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchdogReason {
    /// No token arrived after `prompt_ready`
    FirstToken,
    /// Silence between chunks
    Heartbeat,
    /// Synthetic reason delivered on teardown of an armed watchdog
    ServerDone,
    /// The typing indicator ran out
    TypingTimeout,
}

impl WatchdogReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            WatchdogReason::FirstToken => "watchdog_first_token",
            WatchdogReason::Heartbeat => "watchdog_heartbeat",
            WatchdogReason::ServerDone => "server_done",
            WatchdogReason::TypingTimeout => "typing_timeout",
        }
    }
}

impl fmt::Display for WatchdogReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the watchdog is currently waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogMode {
    Idle,
    FirstToken,
    Steady,
    Typing,
}

impl WatchdogMode {
    fn reason(&self) -> Option<WatchdogReason> {
        match self {
            WatchdogMode::Idle => None,
            WatchdogMode::FirstToken => Some(WatchdogReason::FirstToken),
            WatchdogMode::Steady => Some(WatchdogReason::Heartbeat),
            WatchdogMode::Typing => Some(WatchdogReason::TypingTimeout),
        }
    }
}

/// Callback invoked when the watchdog fires or is torn down while armed.
pub type WatchdogListener = Box<dyn FnMut(WatchdogReason) + Send>;

/// Single-shot, re-armable deadline.
pub struct Watchdog {
    name: &'static str,
    mode: WatchdogMode,
    armed_at: Option<Instant>,
    deadline: Option<Instant>,
    listener: Option<WatchdogListener>,
}

impl Watchdog {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            mode: WatchdogMode::Idle,
            armed_at: None,
            deadline: None,
            listener: None,
        }
    }

    /// Register the callback, replacing any previous one.
    pub fn set_listener(&mut self, listener: WatchdogListener) {
        self.listener = Some(listener);
    }

    /// Arm (or re-arm) in `mode`. Replaces any pending deadline.
    pub fn arm(&mut self, mode: WatchdogMode, timeout: Duration) {
        if mode == WatchdogMode::Idle {
            self.clear();
            return;
        }
        let now = Instant::now();
        self.mode = mode;
        self.armed_at = Some(now);
        self.deadline = Some(now + timeout);
        debug!("{} watchdog armed ({:?}, {:?})", self.name, mode, timeout);
    }

    /// Disarm without notifying the listener.
    pub fn clear(&mut self) {
        self.mode = WatchdogMode::Idle;
        self.armed_at = None;
        self.deadline = None;
    }

    pub fn mode(&self) -> WatchdogMode {
        self.mode
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn armed_at(&self) -> Option<Instant> {
        self.armed_at
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, if armed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Fire now: disarm, then notify. Returns `None` if it was not armed.
    pub fn fire(&mut self) -> Option<WatchdogReason> {
        let reason = self.mode.reason()?;
        self.clear();
        debug!("{} watchdog fired: {}", self.name, reason);
        if let Some(listener) = self.listener.as_mut() {
            listener(reason);
        }
        Some(reason)
    }

    /// Session teardown: an armed watchdog reports `server_done` once, and
    /// the listener is dropped either way.
    pub fn teardown(&mut self) {
        let was_armed = self.is_armed();
        self.clear();
        if let Some(mut listener) = self.listener.take() {
            if was_armed {
                listener(WatchdogReason::ServerDone);
            }
        }
    }
}

impl fmt::Debug for Watchdog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watchdog")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("deadline", &self.deadline)
            .field("has_listener", &self.listener.is_some())
            .finish()
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Sleep until `deadline`, or forever when there is none.
pub async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
