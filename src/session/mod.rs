//! Session management for streaming turns.
//!
//! - `abort` - cancellation handles with an allow-listed reason
//! - `registry` - single-flight map of live turns
//! - `watchdog` - first-token, steady and typing deadlines
//! - `fallback` - one-shot JSON fallback for stalled streams
//! - `state` - phase machine and accumulated text
//! - `stream` - the session loop tying it all together

mod abort;
mod fallback;
mod registry;
mod state;
mod stats;
mod stream;
mod watchdog;

pub use abort::{AbortController, AbortOutcome, AbortReason};
pub use fallback::FallbackManager;
pub use registry::{InFlightGuard, InFlightRegistry, SessionHandle};
pub use state::{Phase, StreamState};
pub use stats::StreamStats;
pub use stream::StreamSession;
pub use watchdog::{sleep_until_opt, Watchdog, WatchdogListener, WatchdogMode, WatchdogReason};
