//! Per-turn state owned by one session.

use serde_json::Value;
use std::fmt;
use tracing::warn;

use crate::sse::payloads;

/// Life cycle of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Sending,
    Streaming,
    Done,
    Errored,
    Aborted,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Done | Phase::Errored | Phase::Aborted)
    }

    fn can_move_to(&self, next: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, next),
            (Idle, Sending)
                | (Sending, Streaming)
                | (Sending, Done)
                | (Sending, Errored)
                | (Sending, Aborted)
                | (Streaming, Done)
                | (Streaming, Errored)
                | (Streaming, Aborted)
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Sending => "sending",
            Phase::Streaming => "streaming",
            Phase::Done => "done",
            Phase::Errored => "errored",
            Phase::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Accumulated state of a turn.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamState {
    phase: Phase,
    /// Content so far; only grows until `done`
    aggregated_text: String,
    pub done_received: bool,
    pub prompt_ready_received: bool,
    pub got_any_token: bool,
    pub last_non_empty_text: Option<String>,
    pub metadata: Option<Value>,
    pub latency_ms: Option<f64>,
    pub primeira_memoria_significativa: bool,
    pub no_text_received: bool,
}

impl Default for StreamState {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            aggregated_text: String::new(),
            done_received: false,
            prompt_ready_received: false,
            got_any_token: false,
            last_non_empty_text: None,
            metadata: None,
            latency_ms: None,
            primeira_memoria_significativa: false,
            no_text_received: false,
        }
    }
}

impl StreamState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn aggregated_text(&self) -> &str {
        &self.aggregated_text
    }

    /// Move to `next`. Terminal phases are final; illegal moves are logged
    /// and refused.
    pub fn transition(&mut self, next: Phase) -> bool {
        if self.phase.can_move_to(next) {
            self.phase = next;
            true
        } else {
            warn!("Refusing phase change {} -> {}", self.phase, next);
            false
        }
    }

    /// Append chunk text. Returns false for protocol noise, which is not
    /// content and leaves the state untouched.
    pub fn append_chunk(&mut self, text: &str) -> bool {
        if payloads::is_trivial(text) {
            return false;
        }
        self.aggregated_text.push_str(text);
        self.got_any_token = true;
        if !text.trim().is_empty() {
            self.last_non_empty_text = Some(text.to_string());
        }
        true
    }

    /// Enter `done` and compute the final text.
    ///
    /// Trimmed aggregate, else the last non-empty chunk, else whatever text
    /// the done payload carries.
    pub fn finish_done(&mut self, done_payload: Option<&Value>) -> String {
        self.transition(Phase::Done);
        self.done_received = true;
        self.no_text_received = !self.got_any_token;

        if let Some(payload) = done_payload {
            if self.metadata.is_none() {
                self.metadata = payload.get("metadata").filter(|m| m.is_object()).cloned();
            }
            if payloads::primeira_flag(payload) {
                self.primeira_memoria_significativa = true;
            }
        }

        let trimmed = self.aggregated_text.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
        if let Some(last) = &self.last_non_empty_text {
            return last.trim().to_string();
        }
        done_payload
            .and_then(payloads::done_fallback_text)
            .map(|t| t.trim().to_string())
            .unwrap_or_default()
    }
}
