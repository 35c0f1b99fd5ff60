//! Abort allow-list, idempotence and single-flight per client message id.

mod common;

use std::time::Duration;

use common::{sse_event, test_client, test_config};
use convo_stream::adapters::mock::{MockHttpClient, MockResponse};
use convo_stream::client::SendOptions;
use convo_stream::error::ConvoError;
use convo_stream::models::StreamRequest;
use convo_stream::session::{AbortController, AbortOutcome, AbortReason, InFlightRegistry};
use serde_json::json;
use tokio_util::sync::CancellationToken;

#[test]
fn test_unlisted_reasons_are_ignored() {
    let controller = AbortController::new();
    for reason in ["timeout", "new-send", "USER_CANCEL", ""] {
        assert_eq!(controller.abort(reason), AbortOutcome::Rejected, "{}", reason);
    }
    assert!(!controller.is_aborted());
    assert_eq!(controller.reason(), None);
}

#[test]
fn test_abort_is_idempotent() {
    let controller = AbortController::new();
    assert_eq!(controller.abort("watchdog_timeout"), AbortOutcome::Aborted);
    assert_eq!(controller.abort("user_cancel"), AbortOutcome::AlreadyAborted);
    assert_eq!(
        controller.abort_with(AbortReason::NewSend),
        AbortOutcome::AlreadyAborted
    );
    assert_eq!(controller.reason(), Some(AbortReason::WatchdogTimeout));
}

#[test]
fn test_caller_signal_merges_but_is_not_cancelled_back() {
    let caller = CancellationToken::new();
    let controller = AbortController::linked_to(&caller);
    let sse = controller.child();

    sse.abort("watchdog_timeout");
    assert!(sse.is_aborted());
    assert!(!controller.is_aborted());

    controller.abort("user_cancel");
    assert!(!caller.is_cancelled());

    let caller = CancellationToken::new();
    let controller = AbortController::linked_to(&caller);
    caller.cancel();
    assert!(controller.is_aborted());
    assert_eq!(controller.effective_reason(), AbortReason::UserCancel);
}

#[test]
fn test_registry_rejects_unlisted_reason() {
    let registry = InFlightRegistry::new();
    let _guard = registry.register("t", AbortController::new());
    assert_eq!(registry.abort("t", "new-send"), Some(AbortOutcome::Rejected));
    assert_eq!(registry.abort("missing", "user_cancel"), None);
    assert!(registry.is_in_flight("t"));
}

#[tokio::test(start_paused = true)]
async fn test_new_send_supersedes_live_turn() {
    let http = MockHttpClient::new();
    let config = test_config();
    http.set_response(
        &config.stream_url(),
        MockResponse::sse_hanging([sse_event("chunk", json!({"text": "primeiro"}))]),
    );
    let client = test_client(&http, config);

    let first = {
        let client = client.clone();
        let request = StreamRequest::new("oi").with_client_message_id("same");
        tokio::spawn(async move { client.collect(request, SendOptions::new()).await })
    };
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(client.is_in_flight("same"));

    let second = {
        let client = client.clone();
        let request = StreamRequest::new("oi de novo").with_client_message_id("same");
        tokio::spawn(async move { client.collect(request, SendOptions::new()).await })
    };

    let err = first.await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        ConvoError::Abort(e) if e.reason == AbortReason::NewSend
    ));
    assert!(!err.is_user_visible());

    // The finished first turn must not evict the second one
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(client.is_in_flight("same"));
    assert_eq!(client.registry().len(), 1);

    assert_eq!(client.cancel("same"), Some(AbortOutcome::Aborted));
    let err = second.await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        ConvoError::Abort(e) if e.reason == AbortReason::UserCancel
    ));
    assert!(client.registry().is_empty());
    assert_eq!(http.released_bodies(), 2);
}
