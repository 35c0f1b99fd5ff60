//! High-level client for conversational turns.
//!
//! `ChatClient` wires the HTTP and identity seams, the configuration and the
//! in-flight registry together, then hands each turn to a
//! [`StreamSession`].

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::adapters::ReqwestHttpClient;
use crate::config::StreamConfig;
use crate::error::{ConvoResult, ErrorContext};
use crate::events::EventSender;
use crate::models::{StreamOutcome, StreamRequest};
use crate::session::{AbortController, AbortOutcome, InFlightRegistry, StreamSession};
use crate::traits::{HttpClient, IdentityProvider, NoIdentity};

/// Per-turn options.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    /// Caller signal merged with the turn's own cancellation
    pub cancel: Option<CancellationToken>,
    /// Overrides `StreamConfig::fallback_enabled` for this turn
    pub fallback: Option<bool>,
}

impl SendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_fallback(mut self, enabled: bool) -> Self {
        self.fallback = Some(enabled);
        self
    }
}

/// Client for streaming turns against one backend.
///
/// Cheap to clone; clones share the HTTP client and the in-flight registry,
/// so single-flight holds across them.
///
/// # Example
///
/// ```ignore
/// use convo_stream::client::{ChatClient, SendOptions};
/// use convo_stream::models::StreamRequest;
///
/// let client = ChatClient::new(StreamConfig::from_env())?;
/// let outcome = client.collect(StreamRequest::new("Olá"), SendOptions::new()).await?;
/// println!("{}", outcome.text);
/// ```
#[derive(Clone)]
pub struct ChatClient {
    http: Arc<dyn HttpClient>,
    identity: Arc<dyn IdentityProvider>,
    registry: InFlightRegistry,
    config: Arc<StreamConfig>,
}

impl ChatClient {
    /// Client backed by reqwest, with no identity headers.
    pub fn new(config: StreamConfig) -> ConvoResult<Self> {
        Self::with_http(
            Arc::new(ReqwestHttpClient::new()),
            Arc::new(NoIdentity),
            config,
        )
    }

    /// Client over arbitrary seams (used by tests and embedders).
    pub fn with_http(
        http: Arc<dyn HttpClient>,
        identity: Arc<dyn IdentityProvider>,
        config: StreamConfig,
    ) -> ConvoResult<Self> {
        config.validate()?;
        Ok(Self {
            http,
            identity,
            registry: InFlightRegistry::new(),
            config: Arc::new(config),
        })
    }

    /// Replace the identity provider.
    pub fn with_identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = identity;
        self
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn registry(&self) -> &InFlightRegistry {
        &self.registry
    }

    /// Run a turn, dispatching events to `events` as they are accepted.
    ///
    /// A live turn with the same client message id is aborted (`new-send`)
    /// before this one is sent.
    pub async fn stream(
        &self,
        request: StreamRequest,
        options: SendOptions,
        events: Option<EventSender>,
    ) -> ConvoResult<StreamOutcome> {
        let mut config = (*self.config).clone();
        if let Some(enabled) = options.fallback {
            config.fallback_enabled = enabled;
        }
        let controller = match &options.cancel {
            Some(token) => AbortController::linked_to(token),
            None => AbortController::new(),
        };

        let client_message_id = request.client_message_id.clone();
        let _guard = self.registry.register(&client_message_id, controller.clone());
        debug!("Turn {} registered", client_message_id);

        let mut session = StreamSession::new(Arc::clone(&self.http), config, request)
            .with_identity(self.identity.as_ref())
            .with_controller(controller);
        if let Some(sender) = events {
            session = session.with_events(sender);
        }

        session.run().await.map_err(|e| {
            if e.is_abort() {
                e
            } else {
                e.with_context(
                    ErrorContext::new("stream")
                        .with_client_message_id(&client_message_id)
                        .with_component("session"),
                )
            }
        })
    }

    /// Run a turn and return only its result.
    pub async fn collect(
        &self,
        request: StreamRequest,
        options: SendOptions,
    ) -> ConvoResult<StreamOutcome> {
        self.stream(request, options, None).await
    }

    /// Cancel the live turn for `client_message_id`, if any.
    pub fn cancel(&self, client_message_id: &str) -> Option<AbortOutcome> {
        let outcome = self.registry.abort(client_message_id, "user_cancel");
        if outcome.is_some() {
            info!("Cancel requested for turn {}", client_message_id);
        }
        outcome
    }

    pub fn is_in_flight(&self, client_message_id: &str) -> bool {
        self.registry.is_in_flight(client_message_id)
    }
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("config", &self.config)
            .field("in_flight", &self.registry.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{MockHttpClient, MockResponse};
    use crate::adapters::StaticIdentity;
    use crate::error::ConvoError;
    use crate::session::AbortReason;
    use crate::traits::GUEST_ID_HEADER;
    use serde_json::json;
    use std::time::Duration;

    const BASE: &str = "http://test.local";

    fn client(http: &MockHttpClient) -> ChatClient {
        ChatClient::with_http(
            Arc::new(http.clone()),
            Arc::new(NoIdentity),
            StreamConfig::default().with_base_url(BASE),
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_invalid_config() {
        let result = ChatClient::new(StreamConfig::default().with_base_url("localhost:8000"));
        assert!(matches!(result, Err(ConvoError::Config(_))));
    }

    #[tokio::test]
    async fn test_collect_and_registry_cleanup() {
        let http = MockHttpClient::new();
        let client = client(&http);
        http.set_response(
            &client.config().stream_url(),
            MockResponse::sse(["event: chunk\ndata: {\"text\":\"oi\"}\n\n", "data: [DONE]\n\n"]),
        );
        let request = StreamRequest::new("oi").with_client_message_id("t1");

        let outcome = client.collect(request, SendOptions::new()).await.unwrap();
        assert_eq!(outcome.text, "oi");
        assert_eq!(outcome.client_message_id, "t1");
        assert!(!client.is_in_flight("t1"));
        assert!(client.registry().is_empty());
    }

    #[tokio::test]
    async fn test_identity_headers_on_both_requests() {
        let http = MockHttpClient::new();
        let client = client(&http).with_identity(Arc::new(StaticIdentity::new().with_guest_id("g-1")));
        http.set_response(&client.config().stream_url(), MockResponse::json(200, json!({})));
        http.set_response(
            &client.config().fallback_url(),
            MockResponse::json(200, json!({"text": "ok json"})),
        );

        let outcome = client
            .collect(StreamRequest::new("oi"), SendOptions::new())
            .await
            .unwrap();
        assert!(outcome.via_fallback);
        for request in http.get_requests() {
            assert_eq!(request.headers.get(GUEST_ID_HEADER), Some(&"g-1".to_string()));
        }
        assert_eq!(http.get_requests().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_in_flight_turn() {
        let http = MockHttpClient::new();
        let client = client(&http);
        http.set_response(
            &client.config().stream_url(),
            MockResponse::sse_hanging(["event: chunk\ndata: {\"text\":\"a\"}\n\n"]),
        );
        let request = StreamRequest::new("oi").with_client_message_id("t2");

        let task = {
            let client = client.clone();
            tokio::spawn(async move { client.collect(request, SendOptions::new()).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(client.is_in_flight("t2"));
        assert_eq!(client.cancel("t2"), Some(AbortOutcome::Aborted));

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            ConvoError::Abort(e) if e.reason == AbortReason::UserCancel
        ));
        assert!(!client.is_in_flight("t2"));
        assert_eq!(client.cancel("t2"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_caller_token_counts_as_user_cancel() {
        let http = MockHttpClient::new();
        let client = client(&http);
        http.set_response(&client.config().stream_url(), MockResponse::sse_hanging(Vec::<&str>::new()));
        let token = CancellationToken::new();

        let task = {
            let client = client.clone();
            let options = SendOptions::new().with_cancel(token.clone()).with_fallback(false);
            tokio::spawn(async move { client.collect(StreamRequest::new("oi"), options).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        token.cancel();

        let err = task.await.unwrap().unwrap_err();
        assert!(err.is_abort());
        assert!(matches!(
            err,
            ConvoError::Abort(e) if e.reason == AbortReason::UserCancel
        ));
    }

    #[tokio::test]
    async fn test_failure_carries_context() {
        let http = MockHttpClient::new();
        let client = client(&http);
        http.set_response(
            &client.config().stream_url(),
            MockResponse::json(500, json!({"detail": "boom"})),
        );
        let request = StreamRequest::new("oi").with_client_message_id("t3");

        let err = client.collect(request, SendOptions::new()).await.unwrap_err();
        let context = err.context().unwrap();
        assert_eq!(context.operation, "stream");
        assert_eq!(context.client_message_id.as_deref(), Some("t3"));
        assert!(err.is_retryable());
    }
}
