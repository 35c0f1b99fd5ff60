//! Wire-level SSE types.
//!
//! Contains the raw frame produced by the reader, the decoded raw event, and
//! the canonical event produced by the normalizer.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// One blank-line-delimited block of the stream.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawFrame {
    /// Value of the last `event:` line, if any
    pub event_name: Option<String>,
    /// `data:` lines (and unprefixed raw lines) in arrival order
    pub data_lines: Vec<String>,
}

impl RawFrame {
    /// Data lines joined the way SSE specifies.
    pub fn data(&self) -> String {
        self.data_lines.join("\n")
    }
}

/// Output of the frame reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Comment-only frame (`: ping`); carries no event
    Heartbeat,
    /// Frame with an event name and/or data
    Event(RawFrame),
}

/// A frame after its data was decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    /// Frame-level event name (or the synthesized `done` for `[DONE]`)
    pub event_type: Option<String>,
    /// Decoded data; `None` when the frame had no data
    pub payload: Option<Value>,
}

impl RawEvent {
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: Some(event_type.into()),
            payload: Some(payload),
        }
    }
}

/// Fixed set of event kinds every backend dialect is mapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalTag {
    PromptReady,
    FirstToken,
    Chunk,
    Meta,
    MetaPending,
    MemorySaved,
    Latency,
    Error,
    Done,
    Control,
}

impl CanonicalTag {
    /// Wire name of the tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalTag::PromptReady => "prompt_ready",
            CanonicalTag::FirstToken => "first_token",
            CanonicalTag::Chunk => "chunk",
            CanonicalTag::Meta => "meta",
            CanonicalTag::MetaPending => "meta_pending",
            CanonicalTag::MemorySaved => "memory_saved",
            CanonicalTag::Latency => "latency",
            CanonicalTag::Error => "error",
            CanonicalTag::Done => "done",
            CanonicalTag::Control => "control",
        }
    }

    /// Chunk-class events go through the dedup guard.
    pub fn is_chunk_class(&self) -> bool {
        matches!(self, CanonicalTag::Chunk | CanonicalTag::FirstToken)
    }
}

impl fmt::Display for CanonicalTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which channel an event arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Data,
    Control,
}

/// Resolved control-channel instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlAction {
    /// Snake-cased `name`/`event` leaf of the control payload
    pub name: String,
    /// What the name resolves to, when it maps onto a canonical tag
    pub action: Option<CanonicalTag>,
}

/// Event after alias resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEvent {
    pub tag: CanonicalTag,
    /// Decoded payload (`Value::Null` when the frame carried none)
    pub payload: Value,
    /// Type string the tag was resolved from
    pub original_type: Option<String>,
    pub channel: Channel,
    /// Present only on the control channel
    pub control: Option<ControlAction>,
}

impl NormalizedEvent {
    /// Tag that drives the session: the control action for control events.
    pub fn effective_tag(&self) -> Option<CanonicalTag> {
        match (&self.channel, &self.control) {
            (Channel::Control, Some(control)) => control.action,
            (Channel::Control, None) => None,
            (Channel::Data, _) => Some(self.tag),
        }
    }
}
