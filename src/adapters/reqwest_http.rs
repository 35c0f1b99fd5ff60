//! reqwest adapter for the [`HttpClient`] seam.

use async_trait::async_trait;
use futures_util::StreamExt;

use crate::traits::{Headers, HttpClient, HttpError, Response, StreamResponse};

/// Which half of an exchange a reqwest error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Connect,
    Body,
}

/// [`HttpClient`] over a shared `reqwest::Client`.
///
/// The wrapped client must not carry a total request timeout: stall
/// detection on streams belongs to the session watchdogs.
///
/// ```ignore
/// use convo_stream::adapters::ReqwestHttpClient;
/// use convo_stream::traits::{Headers, HttpClient};
///
/// let http = ReqwestHttpClient::new();
/// let response = http.post_stream("https://api.example.com/v1/stream", "{}", &Headers::new()).await?;
/// assert!(response.is_event_stream());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a preconfigured client (proxies, TLS roots, connect timeout).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn inner(&self) -> &reqwest::Client {
        &self.client
    }

    async fn send(
        &self,
        url: &str,
        body: &str,
        headers: &Headers,
    ) -> Result<reqwest::Response, HttpError> {
        headers
            .iter()
            .fold(self.client.post(url), |builder, (name, value)| {
                builder.header(name.as_str(), value.as_str())
            })
            .body(body.to_owned())
            .send()
            .await
            .map_err(|e| map_error(e, Phase::Connect))
    }
}

fn map_error(err: reqwest::Error, phase: Phase) -> HttpError {
    let message = err.to_string();
    if err.is_timeout() {
        HttpError::Timeout(message)
    } else if err.is_builder() {
        HttpError::InvalidUrl(message)
    } else if err.is_connect() {
        HttpError::ConnectionFailed(message)
    } else if phase == Phase::Body || err.is_body() || err.is_decode() {
        HttpError::Io(message)
    } else {
        HttpError::Other(message)
    }
}

/// Response headers as a plain map; non-UTF-8 values are skipped.
fn header_map(headers: &reqwest::header::HeaderMap) -> Headers {
    headers
        .iter()
        .filter_map(|(name, value)| Some((name.to_string(), value.to_str().ok()?.to_string())))
        .collect()
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn post(&self, url: &str, body: &str, headers: &Headers) -> Result<Response, HttpError> {
        let response = self.send(url, body, headers).await?;
        let status = response.status().as_u16();
        let headers = header_map(response.headers());
        let body = response
            .bytes()
            .await
            .map_err(|e| map_error(e, Phase::Body))?;
        Ok(Response::with_headers(status, headers, body))
    }

    async fn post_stream(
        &self,
        url: &str,
        body: &str,
        headers: &Headers,
    ) -> Result<StreamResponse, HttpError> {
        let response = self.send(url, body, headers).await?;
        let status = response.status().as_u16();
        let headers = header_map(response.headers());
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| map_error(e, Phase::Body)));

        Ok(StreamResponse {
            status,
            headers,
            body: Box::pin(body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};

    #[test]
    fn test_header_map_lowercases_names() {
        let mut map = HeaderMap::new();
        map.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
        let headers = header_map(&map);
        assert_eq!(
            headers.get("content-type").map(String::as_str),
            Some("text/event-stream")
        );
    }

    #[tokio::test]
    async fn test_refused_connection_maps_to_connection_failed() {
        let http = ReqwestHttpClient::new();
        let err = http
            .post_stream("http://127.0.0.1:59999/v1/stream", "{}", &Headers::new())
            .await
            .unwrap_err();
        assert!(matches!(err, HttpError::ConnectionFailed(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn test_malformed_url_is_invalid_url() {
        let http = ReqwestHttpClient::new();
        let err = http
            .post("not-a-valid-url", "{}", &Headers::new())
            .await
            .unwrap_err();
        assert!(matches!(err, HttpError::InvalidUrl(_)), "{:?}", err);
    }
}
