//! Mock HTTP client for testing.
//!
//! Serves canned JSON and SSE responses and records every request so tests
//! can verify headers, bodies and request counts.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use futures_util::StreamExt;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use crate::traits::{ByteStream, Headers, HttpClient, HttpError, Response, StreamResponse};

/// A recorded HTTP request for verification in tests.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// `POST` for buffered requests, `POST_STREAM` for streaming ones
    pub method: String,
    /// Request URL
    pub url: String,
    /// Request headers
    pub headers: Headers,
    /// Request body
    pub body: String,
}

/// Configuration for a mock response.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Return a buffered response
    Success(Response),
    /// Fail before any status is received
    Error(HttpError),
    /// Return a streamed body
    Sse {
        status: u16,
        content_type: String,
        chunks: Vec<Bytes>,
        /// Keep the body open after the last chunk instead of ending it
        hang: bool,
    },
}

impl MockResponse {
    /// 200 `text/event-stream` body that ends after `chunks`.
    pub fn sse<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Bytes>,
    {
        MockResponse::Sse {
            status: 200,
            content_type: "text/event-stream".to_string(),
            chunks: chunks.into_iter().map(Into::into).collect(),
            hang: false,
        }
    }

    /// 200 `text/event-stream` body that stalls after `chunks`.
    pub fn sse_hanging<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Bytes>,
    {
        MockResponse::Sse {
            status: 200,
            content_type: "text/event-stream".to_string(),
            chunks: chunks.into_iter().map(Into::into).collect(),
            hang: true,
        }
    }

    /// Buffered JSON response.
    pub fn json(status: u16, value: serde_json::Value) -> Self {
        let mut headers = Headers::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        MockResponse::Success(Response::with_headers(
            status,
            headers,
            Bytes::from(value.to_string()),
        ))
    }
}

/// Body wrapper that counts how many bodies were dropped.
struct TrackedBody {
    inner: ByteStream,
    released: Arc<AtomicUsize>,
}

impl Stream for TrackedBody {
    type Item = Result<Bytes, HttpError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl Drop for TrackedBody {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Mock HTTP client for testing.
///
/// # Example
///
/// ```ignore
/// use convo_stream::adapters::mock::{MockHttpClient, MockResponse};
///
/// let client = MockHttpClient::new();
/// client.set_response(
///     "https://api.example.com/v1/stream",
///     MockResponse::sse(["event: chunk\ndata: {\"text\":\"oi\"}\n\n"]),
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockHttpClient {
    /// Configured responses by URL
    responses: Arc<Mutex<HashMap<String, MockResponse>>>,
    /// Default response when no specific match
    default_response: Arc<Mutex<Option<MockResponse>>>,
    /// Recorded requests for verification
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    /// Number of streamed bodies dropped by the consumer
    released_bodies: Arc<AtomicUsize>,
}

impl MockHttpClient {
    /// Create a new mock HTTP client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a response for a specific URL.
    ///
    /// The URL is matched exactly first, then as a prefix.
    pub fn set_response(&self, url: &str, response: MockResponse) {
        lock(&self.responses).insert(url.to_string(), response);
    }

    /// Set a default response for URLs without specific matches.
    pub fn set_default_response(&self, response: MockResponse) {
        *lock(&self.default_response) = Some(response);
    }

    /// Get all recorded requests.
    pub fn get_requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    /// Recorded requests sent to `url`.
    pub fn requests_to(&self, url: &str) -> Vec<RecordedRequest> {
        lock(&self.requests)
            .iter()
            .filter(|r| r.url == url)
            .cloned()
            .collect()
    }

    /// Clear all recorded requests.
    pub fn clear_requests(&self) {
        lock(&self.requests).clear();
    }

    /// How many streamed bodies have been dropped so far.
    pub fn released_bodies(&self) -> usize {
        self.released_bodies.load(Ordering::SeqCst)
    }

    fn record_request(&self, method: &str, url: &str, headers: &Headers, body: &str) {
        lock(&self.requests).push(RecordedRequest {
            method: method.to_string(),
            url: url.to_string(),
            headers: headers.clone(),
            body: body.to_string(),
        });
    }

    fn get_response(&self, url: &str) -> Option<MockResponse> {
        let responses = lock(&self.responses);

        if let Some(response) = responses.get(url) {
            return Some(response.clone());
        }

        for (pattern, response) in responses.iter() {
            if url.starts_with(pattern) {
                return Some(response.clone());
            }
        }

        lock(&self.default_response).clone()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn post(&self, url: &str, body: &str, headers: &Headers) -> Result<Response, HttpError> {
        self.record_request("POST", url, headers, body);

        match self.get_response(url) {
            Some(MockResponse::Success(response)) => Ok(response),
            Some(MockResponse::Error(err)) => Err(err),
            Some(MockResponse::Sse { .. }) => Err(HttpError::Other(
                "Stream response on non-stream request".to_string(),
            )),
            None => Err(HttpError::Other(format!("No mock response for URL: {}", url))),
        }
    }

    async fn post_stream(
        &self,
        url: &str,
        body: &str,
        headers: &Headers,
    ) -> Result<StreamResponse, HttpError> {
        self.record_request("POST_STREAM", url, headers, body);

        match self.get_response(url) {
            Some(MockResponse::Sse {
                status,
                content_type,
                chunks,
                hang,
            }) => {
                let chunks = futures::stream::iter(chunks.into_iter().map(Ok));
                let inner: ByteStream = if hang {
                    Box::pin(chunks.chain(futures::stream::pending()))
                } else {
                    Box::pin(chunks)
                };
                let mut response_headers = Headers::new();
                response_headers.insert("content-type".to_string(), content_type);
                Ok(StreamResponse {
                    status,
                    headers: response_headers,
                    body: Box::pin(TrackedBody {
                        inner,
                        released: Arc::clone(&self.released_bodies),
                    }),
                })
            }
            Some(MockResponse::Success(response)) => Ok(StreamResponse {
                status: response.status,
                headers: response.headers,
                body: Box::pin(futures::stream::iter(vec![Ok(response.body)])),
            }),
            Some(MockResponse::Error(err)) => Err(err),
            None => Err(HttpError::Other(format!("No mock response for URL: {}", url))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_post_with_json_response() {
        let client = MockHttpClient::new();
        client.set_response(
            "https://example.com/v1/ask",
            MockResponse::json(200, serde_json::json!({"message": "oi"})),
        );

        let response = client
            .post("https://example.com/v1/ask", r#"{"stream":false}"#, &Headers::new())
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        let requests = client.get_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[0].body, r#"{"stream":false}"#);
    }

    #[tokio::test]
    async fn test_post_stream_with_chunks() {
        let client = MockHttpClient::new();
        client.set_response(
            "https://example.com/v1/stream",
            MockResponse::sse(["chunk1", "chunk2"]),
        );

        let response = client
            .post_stream("https://example.com/v1/stream", "{}", &Headers::new())
            .await
            .unwrap();
        assert!(response.is_event_stream());

        let mut body = response.body;
        let mut chunks = Vec::new();
        while let Some(result) = body.next().await {
            chunks.push(result.unwrap());
        }
        assert_eq!(chunks, vec![Bytes::from("chunk1"), Bytes::from("chunk2")]);

        drop(body);
        assert_eq!(client.released_bodies(), 1);
    }

    #[tokio::test]
    async fn test_no_response_configured() {
        let client = MockHttpClient::new();
        let result = client
            .post("https://example.com/missing", "{}", &Headers::new())
            .await;
        assert!(matches!(result, Err(HttpError::Other(_))));
    }

    #[tokio::test]
    async fn test_prefix_match_and_headers_recorded() {
        let client = MockHttpClient::new();
        client.set_response(
            "https://example.com/v1",
            MockResponse::json(200, serde_json::json!({})),
        );

        let mut headers = Headers::new();
        headers.insert("X-Guest-Id".to_string(), "guest-1".to_string());
        client
            .post("https://example.com/v1/ask", "{}", &headers)
            .await
            .unwrap();

        let requests = client.requests_to("https://example.com/v1/ask");
        assert_eq!(
            requests[0].headers.get("X-Guest-Id"),
            Some(&"guest-1".to_string())
        );
    }
}
