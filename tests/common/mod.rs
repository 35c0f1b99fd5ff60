//! Common test utilities for integration tests.
//!
//! Fixtures for building clients over the mock HTTP seam and for inspecting
//! the events a turn dispatched.
//!
//! # Example
//!
//! ```ignore
//! mod common;
//! use common::{test_client, sse_event};
//!
//! let http = MockHttpClient::new();
//! let client = test_client(&http, test_config());
//! ```

#![allow(dead_code)]

use std::sync::Arc;

use convo_stream::adapters::mock::MockHttpClient;
use convo_stream::client::ChatClient;
use convo_stream::config::StreamConfig;
use convo_stream::events::{EventReceiver, StreamEvent};
use convo_stream::traits::NoIdentity;
use serde_json::Value;

pub const BASE_URL: &str = "http://backend.test";

/// Config pointing at [`BASE_URL`] with default timings.
pub fn test_config() -> StreamConfig {
    StreamConfig::default().with_base_url(BASE_URL)
}

/// Client over the mock HTTP seam.
pub fn test_client(http: &MockHttpClient, config: StreamConfig) -> ChatClient {
    ChatClient::with_http(Arc::new(http.clone()), Arc::new(NoIdentity), config)
        .expect("test config is valid")
}

/// One `event:` + `data:` frame.
pub fn sse_event(event: &str, data: Value) -> String {
    format!("event: {}\ndata: {}\n\n", event, data)
}

/// One frame carrying only a `data:` line.
pub fn sse_data(data: Value) -> String {
    format!("data: {}\n\n", data)
}

/// Everything dispatched so far.
pub fn drain(rx: &mut EventReceiver) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Only the chunk and done events, in order.
pub fn content_events(events: &[StreamEvent]) -> Vec<StreamEvent> {
    events
        .iter()
        .filter(|e| matches!(e, StreamEvent::Chunk { .. } | StreamEvent::Done { .. }))
        .cloned()
        .collect()
}

/// Text of every chunk event, in order.
pub fn chunk_texts(events: &[StreamEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Chunk { text, .. } => Some(text.clone()),
            _ => None,
        })
        .collect()
}
