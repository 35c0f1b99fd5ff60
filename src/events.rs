//! Events dispatched to the caller while a turn runs.
//!
//! One tagged enum over one channel replaces per-kind callbacks: callers
//! match on [`StreamEvent`] instead of registering handlers.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::session::WatchdogReason;
use crate::sse::CanonicalTag;

/// Where a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkSource {
    Stream,
    JsonFallback,
}

/// Accepted event of a running turn.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Backend accepted the prompt
    PromptReady,
    /// First content token of the turn; sent once, before its chunk
    FirstToken { text: String },
    /// Content text, in order, without duplicates
    Chunk {
        text: String,
        is_first_chunk: bool,
        source: ChunkSource,
        index: Option<f64>,
        payload: Value,
    },
    Meta { metadata: Value },
    MetaPending { metadata: Value },
    MemorySaved {
        memory: Option<Value>,
        primeira: bool,
    },
    Latency { value: Option<f64> },
    /// Control-channel instruction, sent before its action is applied
    Control {
        name: Option<String>,
        action: Option<CanonicalTag>,
        payload: Value,
    },
    /// Terminal success
    Done {
        text: String,
        metadata: Option<Value>,
        no_text_received: bool,
        primeira: bool,
    },
    /// Terminal failure (or a stall escalated to an abort)
    Error {
        message: String,
        code: Option<String>,
    },
    Watchdog { reason: WatchdogReason },
}

impl StreamEvent {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::PromptReady => "prompt_ready",
            StreamEvent::FirstToken { .. } => "first_token",
            StreamEvent::Chunk { .. } => "chunk",
            StreamEvent::Meta { .. } => "meta",
            StreamEvent::MetaPending { .. } => "meta_pending",
            StreamEvent::MemorySaved { .. } => "memory_saved",
            StreamEvent::Latency { .. } => "latency",
            StreamEvent::Control { .. } => "control",
            StreamEvent::Done { .. } => "done",
            StreamEvent::Error { .. } => "error",
            StreamEvent::Watchdog { .. } => "watchdog",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done { .. } | StreamEvent::Error { .. })
    }
}

/// Sending half of the event channel.
pub type EventSender = mpsc::UnboundedSender<StreamEvent>;
/// Receiving half of the event channel.
pub type EventReceiver = mpsc::UnboundedReceiver<StreamEvent>;

/// New event channel.
pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
