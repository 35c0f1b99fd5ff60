//! JSON fallback for stalled streams.
//!
//! A guard deadline races the stream. When it (or the first-token watchdog)
//! expires before any content arrived, the session aborts the SSE request
//! and asks the non-streaming endpoint once. The reply is turned back into a
//! `chunk` + `done` pair so consumers see the same event shape either way.

use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{transport_error, ConvoResult, ProtocolError};
use crate::models::FallbackReply;
use crate::sse::RawEvent;
use crate::traits::{Headers, HttpClient};

/// Upper bound on how much of an error body is kept for the message.
const ERROR_BODY_LIMIT: usize = 512;

/// Per-session fallback bookkeeping.
#[derive(Debug)]
pub struct FallbackManager {
    enabled: bool,
    timeout: Duration,
    guard_deadline: Option<Instant>,
    requested: bool,
}

impl FallbackManager {
    pub fn new(enabled: bool, timeout: Duration) -> Self {
        Self {
            enabled,
            timeout,
            guard_deadline: None,
            requested: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Start the guard window (called when the request is sent).
    pub fn start(&mut self) {
        if self.enabled {
            self.guard_deadline = Some(Instant::now() + self.timeout);
        }
    }

    /// Deadline of the guard window, while it still matters.
    pub fn guard_deadline(&self) -> Option<Instant> {
        if self.requested {
            None
        } else {
            self.guard_deadline
        }
    }

    /// Stop the guard: real content arrived or the window was consumed.
    pub fn disarm(&mut self) {
        if self.guard_deadline.take().is_some() {
            debug!("Fallback guard disarmed");
        }
    }

    /// Whether a trigger right now would start the fallback.
    pub fn is_eligible(&self, got_any_token: bool) -> bool {
        self.enabled && !self.requested && !got_any_token
    }

    /// Claim the single fallback attempt. False if already claimed.
    pub fn mark_requested(&mut self) -> bool {
        if self.requested {
            warn!("Fallback already requested for this turn");
            return false;
        }
        self.requested = true;
        self.guard_deadline = None;
        true
    }

    pub fn is_requested(&self) -> bool {
        self.requested
    }

    /// Issue the JSON request and parse its reply.
    pub async fn request(
        http: &dyn HttpClient,
        url: &str,
        body: &str,
        headers: &Headers,
    ) -> ConvoResult<FallbackReply> {
        info!("Requesting JSON fallback from {}", url);
        let response = http
            .post(url, body, headers)
            .await
            .map_err(|e| transport_error(e, url))?;

        if !response.is_success() {
            let message: String = response
                .text()
                .unwrap_or_default()
                .chars()
                .take(ERROR_BODY_LIMIT)
                .collect();
            return Err(ProtocolError::HttpStatus {
                status: response.status,
                message,
            }
            .into());
        }

        let value: Value = response.json().map_err(|e| ProtocolError::InvalidFallbackBody {
            message: e.to_string(),
        })?;
        Ok(FallbackReply::from_value(&value)?)
    }

    /// Raw events replaying a reply through the normal pipeline.
    pub fn synthesize(reply: &FallbackReply) -> [RawEvent; 2] {
        let chunk = RawEvent::new(
            "chunk",
            json!({
                "text": reply.text,
                "isFirstChunk": true,
                "source": "json_fallback",
            }),
        );
        let mut done = json!({ "done": true });
        if let Some(metadata) = &reply.metadata {
            done["metadata"] = metadata.clone();
        }
        if reply.primeira_memoria_significativa {
            done["primeiraMemoriaSignificativa"] = Value::Bool(true);
        }
        [chunk, RawEvent::new("done", done)]
    }
}
