//! One streaming turn, from request to terminal state.
//!
//! The session owns everything a turn needs (reader, dedup guard, watchdogs,
//! fallback bookkeeping) and drives it from a single `tokio::select!` loop, so
//! events are applied strictly in arrival order. Deadlines are polled in the
//! loop rather than spawned, which keeps the whole turn one future: dropping
//! it releases the body and every timer.

use futures_util::{FutureExt, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::abort::{AbortController, AbortReason};
use super::fallback::FallbackManager;
use super::state::{Phase, StreamState};
use super::stats::StreamStats;
use super::watchdog::{sleep_until_opt, Watchdog, WatchdogMode, WatchdogReason};
use crate::config::StreamConfig;
use crate::error::{
    transport_error, AbortError, ConvoError, ConvoResult, ProtocolError, StreamError,
};
use crate::events::{ChunkSource, EventSender, StreamEvent};
use crate::models::{StreamOutcome, StreamRequest};
use crate::sse::payloads;
use crate::sse::{
    decode, normalize, CanonicalTag, Channel, ChunkRecord, DedupGuard, Frame, FrameReader,
    RawEvent,
};
use crate::traits::{
    Headers, HttpClient, HttpError, IdentityProvider, StreamResponse, CLIENT_MESSAGE_ID_HEADER,
};

/// Bytes of a non-2xx body kept for the error message.
const ERROR_BODY_LIMIT: usize = 512;
/// How long an error response may take to deliver its body.
const ERROR_BODY_TIMEOUT: Duration = Duration::from_secs(5);

/// How the connect phase ended.
enum Connect {
    Response(StreamResponse),
    Failed(HttpError),
    Cancelled,
    Fallback,
}

enum ConnectStep {
    Response(Result<StreamResponse, HttpError>),
    Cancelled,
    Guard,
    Typing,
}

enum ReadStep {
    Data(Option<Result<bytes::Bytes, HttpError>>),
    Cancelled,
    Guard,
    Stall,
    Typing,
}

/// A single conversational turn.
///
/// # Example
///
/// ```ignore
/// let (tx, mut rx) = convo_stream::events::channel();
/// let session = StreamSession::new(http, config, request)
///     .with_identity(&identity)
///     .with_events(tx);
/// let outcome = session.run().await?;
/// ```
pub struct StreamSession {
    http: Arc<dyn HttpClient>,
    config: StreamConfig,
    request: StreamRequest,
    headers: Headers,
    controller: AbortController,
    events: Option<EventSender>,
    state: StreamState,
    dedup: DedupGuard,
    fallback: FallbackManager,
    /// First-token, then steady, deadline
    stall: Watchdog,
    typing: Watchdog,
    stats: StreamStats,
    sent_at: Option<Instant>,
    via_fallback: bool,
}

impl StreamSession {
    pub fn new(http: Arc<dyn HttpClient>, config: StreamConfig, request: StreamRequest) -> Self {
        let mut headers = Headers::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.insert("Accept".to_string(), "text/event-stream".to_string());
        headers.insert(
            CLIENT_MESSAGE_ID_HEADER.to_string(),
            request.client_message_id.clone(),
        );
        let fallback = FallbackManager::new(config.fallback_enabled, config.fallback_timeout);

        Self {
            http,
            config,
            request,
            headers,
            controller: AbortController::new(),
            events: None,
            state: StreamState::new(),
            dedup: DedupGuard::new(),
            fallback,
            stall: Watchdog::new("stall"),
            typing: Watchdog::new("typing"),
            stats: StreamStats::default(),
            sent_at: None,
            via_fallback: false,
        }
    }

    /// Attach identity headers; shared by the stream and fallback requests.
    pub fn with_identity(mut self, identity: &dyn IdentityProvider) -> Self {
        self.headers.extend(identity.identity_headers());
        self
    }

    /// Use `controller` as the turn's cancellation handle.
    pub fn with_controller(mut self, controller: AbortController) -> Self {
        self.controller = controller;
        self
    }

    /// Dispatch events (watchdog notifications included) to `sender`.
    pub fn with_events(mut self, sender: EventSender) -> Self {
        for watchdog in [&mut self.stall, &mut self.typing] {
            let tx = sender.clone();
            watchdog.set_listener(Box::new(move |reason| {
                let _ = tx.send(StreamEvent::Watchdog { reason });
            }));
        }
        self.events = Some(sender);
        self
    }

    pub fn client_message_id(&self) -> &str {
        &self.request.client_message_id
    }

    pub fn controller(&self) -> &AbortController {
        &self.controller
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    /// Run the turn to completion.
    ///
    /// `Ok` only for `done`. An accepted abort returns
    /// `Err(ConvoError::Abort)`, which callers should not show as a failure.
    pub async fn run(mut self) -> ConvoResult<StreamOutcome> {
        self.state.transition(Phase::Sending);
        self.sent_at = Some(Instant::now());
        let body = match serde_json::to_string(&self.request) {
            Ok(body) => body,
            Err(e) => return Err(self.finish_error(e.into())),
        };
        self.fallback.start();
        self.typing
            .arm(WatchdogMode::Typing, self.config.typing_timeout);
        info!(
            "Sending turn {} to {}",
            self.request.client_message_id,
            self.config.stream_url()
        );

        let sse = self.controller.child();
        let response = match self.connect(&sse, &body).await {
            Connect::Response(response) => response,
            Connect::Fallback => {
                info!("No response within the fallback window");
                return self.run_fallback(&sse).await;
            }
            Connect::Cancelled => return Err(self.finish_aborted()),
            Connect::Failed(e) => return Err(self.finish_http_failure(e, &sse)),
        };

        if !response.is_success() {
            let status = response.status;
            let drain = tokio::time::timeout(ERROR_BODY_TIMEOUT, response.read_text(ERROR_BODY_LIMIT));
            let message = tokio::select! {
                biased;
                _ = sse.cancelled() => return Err(self.finish_aborted()),
                drained = drain => drained.unwrap_or_else(|_| {
                    debug!("Error body still open after {:?}", ERROR_BODY_TIMEOUT);
                    String::new()
                }),
            };
            warn!("Stream request failed with HTTP {}", status);
            return Err(self.finish_error(ProtocolError::HttpStatus { status, message }.into()));
        }
        if !response.is_event_stream() {
            let content_type = response.content_type().map(str::to_string);
            drop(response);
            if self.fallback.is_eligible(self.state.got_any_token) {
                warn!(
                    "Expected an event stream, got {:?}; using fallback",
                    content_type
                );
                return self.run_fallback(&sse).await;
            }
            return Err(
                self.finish_error(ProtocolError::UnexpectedContentType { content_type }.into())
            );
        }

        self.state.transition(Phase::Streaming);
        self.stall
            .arm(WatchdogMode::FirstToken, self.config.first_token_timeout);
        self.read(response, &sse).await
    }

    async fn connect(&mut self, sse: &AbortController, body: &str) -> Connect {
        let http = Arc::clone(&self.http);
        let headers = self.headers.clone();
        let url = self.config.stream_url();
        let mut request = http.post_stream(&url, body, &headers);

        loop {
            let step = tokio::select! {
                biased;
                _ = sse.cancelled() => ConnectStep::Cancelled,
                _ = sleep_until_opt(self.fallback.guard_deadline()) => ConnectStep::Guard,
                _ = sleep_until_opt(self.typing.deadline()) => ConnectStep::Typing,
                result = &mut request => ConnectStep::Response(result),
            };
            match step {
                ConnectStep::Response(Ok(response)) => {
                    debug!("Stream response: HTTP {}", response.status);
                    return Connect::Response(response);
                }
                ConnectStep::Response(Err(e)) => return Connect::Failed(e),
                ConnectStep::Cancelled => return Connect::Cancelled,
                ConnectStep::Guard => return Connect::Fallback,
                ConnectStep::Typing => {
                    self.typing.fire();
                }
            }
        }
    }

    async fn read(
        &mut self,
        response: StreamResponse,
        sse: &AbortController,
    ) -> ConvoResult<StreamOutcome> {
        let mut body = response.body;
        let mut reader = FrameReader::new();

        loop {
            let mut step = tokio::select! {
                biased;
                _ = sse.cancelled() => ReadStep::Cancelled,
                _ = sleep_until_opt(self.fallback.guard_deadline()) => ReadStep::Guard,
                _ = sleep_until_opt(self.stall.deadline()) => ReadStep::Stall,
                _ = sleep_until_opt(self.typing.deadline()) => ReadStep::Typing,
                next = body.next() => ReadStep::Data(next),
            };
            // Bytes already delivered are applied before a timer may end the read.
            if matches!(step, ReadStep::Guard | ReadStep::Stall) {
                if let Some(next) = body.next().now_or_never() {
                    step = ReadStep::Data(next);
                }
            }

            match step {
                ReadStep::Data(Some(Ok(chunk))) => {
                    self.stats.bytes_received += chunk.len() as u64;
                    for frame in reader.push(&chunk) {
                        if let Some(result) = self.handle_frame(frame) {
                            return result;
                        }
                    }
                }
                ReadStep::Data(Some(Err(e))) => {
                    if sse.is_aborted() {
                        return Err(self.finish_aborted());
                    }
                    warn!("Stream read failed: {}", e);
                    return Err(self.finish_error(
                        StreamError::ConnectionLost {
                            message: e.to_string(),
                        }
                        .into(),
                    ));
                }
                ReadStep::Data(None) => {
                    if let Some(frame) = reader.finish() {
                        if let Some(result) = self.handle_frame(frame) {
                            return result;
                        }
                    }
                    debug!("Stream ended without a done event");
                    return Ok(self.finish_done(None));
                }
                ReadStep::Cancelled => return Err(self.finish_aborted()),
                ReadStep::Guard => {
                    if self.fallback.is_eligible(self.state.got_any_token) {
                        drop(body);
                        info!("No token within the fallback window");
                        return self.run_fallback(sse).await;
                    }
                    self.fallback.disarm();
                }
                ReadStep::Stall => {
                    let Some(reason) = self.stall.fire() else {
                        continue;
                    };
                    if reason == WatchdogReason::FirstToken
                        && self.fallback.is_eligible(self.state.got_any_token)
                    {
                        drop(body);
                        return self.run_fallback(sse).await;
                    }
                    return Err(self.finish_stalled(reason));
                }
                ReadStep::Typing => {
                    self.typing.fire();
                }
            }
        }
    }

    /// Apply one frame. `Some` once the turn reached a terminal state.
    fn handle_frame(&mut self, frame: Frame) -> Option<ConvoResult<StreamOutcome>> {
        match frame {
            Frame::Heartbeat => {
                self.stats.heartbeats += 1;
                if self.stall.mode() == WatchdogMode::Steady {
                    self.stall
                        .arm(WatchdogMode::Steady, self.config.steady_timeout);
                }
                None
            }
            Frame::Event(raw) => {
                self.stats.frames += 1;
                let event = decode(&raw);
                self.handle_raw(&event, ChunkSource::Stream)
            }
        }
    }

    fn handle_raw(
        &mut self,
        raw: &RawEvent,
        source: ChunkSource,
    ) -> Option<ConvoResult<StreamOutcome>> {
        let event = normalize(raw)?;
        if event.channel == Channel::Control {
            self.emit(StreamEvent::Control {
                name: event.control.as_ref().map(|c| c.name.clone()),
                action: event.effective_tag(),
                payload: event.payload.clone(),
            });
        }
        let tag = event.effective_tag()?;
        self.apply(tag, &event.payload, source)
    }

    fn apply(
        &mut self,
        tag: CanonicalTag,
        payload: &Value,
        source: ChunkSource,
    ) -> Option<ConvoResult<StreamOutcome>> {
        match tag {
            CanonicalTag::PromptReady => {
                self.state.prompt_ready_received = true;
                if !self.state.got_any_token && source == ChunkSource::Stream {
                    self.stall
                        .arm(WatchdogMode::FirstToken, self.config.first_token_timeout);
                }
                self.emit(StreamEvent::PromptReady);
            }
            CanonicalTag::FirstToken | CanonicalTag::Chunk => {
                self.apply_chunk(payload, source);
            }
            CanonicalTag::Meta | CanonicalTag::MetaPending => {
                let metadata = match payloads::extract_metadata(payload) {
                    Some(metadata) => {
                        self.state.metadata = Some(metadata.clone());
                        metadata
                    }
                    None => Value::Null,
                };
                self.emit(if tag == CanonicalTag::Meta {
                    StreamEvent::Meta { metadata }
                } else {
                    StreamEvent::MetaPending { metadata }
                });
            }
            CanonicalTag::MemorySaved => {
                let primeira = payloads::primeira_flag(payload);
                if primeira {
                    self.state.primeira_memoria_significativa = true;
                }
                self.emit(StreamEvent::MemorySaved {
                    memory: payloads::extract_memory(payload),
                    primeira,
                });
            }
            CanonicalTag::Latency => {
                let value = payloads::extract_latency(payload);
                if value.is_some() {
                    self.state.latency_ms = value;
                }
                self.emit(StreamEvent::Latency { value });
            }
            CanonicalTag::Error => {
                let (message, code) = payloads::extract_error(payload);
                warn!("Backend error event: {}", message);
                return Some(Err(
                    self.finish_error(StreamError::BackendError { code, message }.into())
                ));
            }
            CanonicalTag::Done => return Some(Ok(self.finish_done(Some(payload)))),
            CanonicalTag::Control => {}
        }
        None
    }

    fn apply_chunk(&mut self, payload: &Value, source: ChunkSource) {
        // Any chunk frame proves the stream alive, content or not.
        if source == ChunkSource::Stream && self.stall.mode() == WatchdogMode::Steady {
            self.stall
                .arm(WatchdogMode::Steady, self.config.steady_timeout);
        }
        let layers: Vec<&Value> = payloads::layers(payload).collect();
        let record = ChunkRecord::extract(&layers);
        if !self.dedup.admit(&record).is_accept() {
            self.stats.chunks_dropped += 1;
            return;
        }

        let Some(text) = payloads::extract_text(payload) else {
            debug!("Chunk without text");
            return;
        };
        let is_first_chunk = !self.state.got_any_token;
        if !self.state.append_chunk(&text) {
            debug!("Skipping trivial chunk {:?}", text);
            return;
        }

        if is_first_chunk {
            self.stats.time_to_first_token = self.sent_at.map(|t| t.elapsed());
            self.fallback.disarm();
            self.typing.clear();
            self.emit(StreamEvent::FirstToken { text: text.clone() });
        }
        if source == ChunkSource::Stream {
            self.stall
                .arm(WatchdogMode::Steady, self.config.steady_timeout);
        }
        self.emit(StreamEvent::Chunk {
            text,
            is_first_chunk,
            source,
            index: record.index,
            payload: payload.clone(),
        });
    }

    /// Abort the SSE request and replace it with one JSON request.
    async fn run_fallback(&mut self, sse: &AbortController) -> ConvoResult<StreamOutcome> {
        if !self.fallback.mark_requested() {
            return Err(self.finish_stalled(WatchdogReason::FirstToken));
        }
        sse.abort(AbortReason::WatchdogTimeout.as_str());
        self.stall.clear();

        let url = self.config.fallback_url();
        let body = match serde_json::to_string(&self.request.for_fallback()) {
            Ok(body) => body,
            Err(e) => return Err(self.finish_error(e.into())),
        };
        let http = Arc::clone(&self.http);
        let headers = self.headers.clone();

        let reply = tokio::select! {
            biased;
            _ = self.controller.cancelled() => None,
            reply = FallbackManager::request(http.as_ref(), &url, &body, &headers) => Some(reply),
        };

        match reply {
            None => Err(self.finish_aborted()),
            Some(Err(e)) => {
                warn!("Fallback request failed: {}", e);
                Err(self.finish_error(e))
            }
            Some(Ok(reply)) => {
                info!("Fallback reply received ({} chars)", reply.text.len());
                self.via_fallback = true;
                for raw in FallbackManager::synthesize(&reply) {
                    if let Some(result) = self.handle_raw(&raw, ChunkSource::JsonFallback) {
                        return result;
                    }
                }
                Ok(self.finish_done(None))
            }
        }
    }

    fn emit(&mut self, event: StreamEvent) {
        debug!("Dispatching {}", event.kind());
        self.stats.events_dispatched += 1;
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    /// Stop both watchdogs and freeze the clock.
    fn close(&mut self) {
        self.stall.teardown();
        self.typing.teardown();
        self.fallback.disarm();
        if let Some(sent_at) = self.sent_at {
            self.stats.elapsed = sent_at.elapsed();
        }
    }

    fn finish_done(&mut self, payload: Option<&Value>) -> StreamOutcome {
        self.close();
        let text = self.state.finish_done(payload);
        let metadata = self.state.metadata.clone();
        info!(
            "Turn {} done ({} chars{})",
            self.request.client_message_id,
            text.len(),
            if self.via_fallback { ", via fallback" } else { "" }
        );
        if self.state.no_text_received {
            warn!("Turn {} finished without any text", self.request.client_message_id);
        }

        self.emit(StreamEvent::Done {
            text: text.clone(),
            metadata: metadata.clone(),
            no_text_received: self.state.no_text_received,
            primeira: self.state.primeira_memoria_significativa,
        });

        StreamOutcome {
            client_message_id: self.request.client_message_id.clone(),
            text,
            metadata,
            done: true,
            primeira_memoria_significativa: self.state.primeira_memoria_significativa,
            no_text_received: self.state.no_text_received,
            latency_ms: self.state.latency_ms,
            via_fallback: self.via_fallback,
            stats: self.stats.clone(),
        }
    }

    fn finish_aborted(&mut self) -> ConvoError {
        self.close();
        self.state.transition(Phase::Aborted);
        let reason = self.controller.effective_reason();
        info!("Turn {} aborted ({})", self.request.client_message_id, reason);
        AbortError::new(reason).into()
    }

    fn finish_error(&mut self, error: ConvoError) -> ConvoError {
        self.close();
        self.state.transition(Phase::Errored);
        let (message, code) = match error.inner() {
            ConvoError::Stream(StreamError::BackendError { code, message }) => {
                (message.clone(), code.clone())
            }
            other => (other.user_message(), Some(other.error_code().to_string())),
        };
        warn!(
            "Turn {} failed: {}",
            self.request.client_message_id, error
        );
        self.emit(StreamEvent::Error { message, code });
        error
    }

    fn finish_http_failure(&mut self, error: HttpError, sse: &AbortController) -> ConvoError {
        if matches!(error, HttpError::Cancelled) && sse.is_aborted() {
            return self.finish_aborted();
        }
        let url = self.config.stream_url();
        self.finish_error(transport_error(error, &url))
    }

    /// A stall the fallback cannot recover becomes a watchdog abort.
    fn finish_stalled(&mut self, reason: WatchdogReason) -> ConvoError {
        warn!(
            "Turn {} stalled ({}) with no fallback available",
            self.request.client_message_id, reason
        );
        let stalled = StreamError::Stalled {
            reason: reason.as_str().to_string(),
        };
        let code = AbortError::new(AbortReason::WatchdogTimeout).error_code();
        self.emit(StreamEvent::Error {
            message: stalled.user_message(),
            code: Some(code.to_string()),
        });
        self.controller.abort_with(AbortReason::WatchdogTimeout);
        self.finish_aborted()
    }
}

impl std::fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSession")
            .field("client_message_id", &self.request.client_message_id)
            .field("phase", &self.state.phase())
            .field("fallback", &self.fallback)
            .field("stall", &self.stall)
            .finish_non_exhaustive()
    }
}
