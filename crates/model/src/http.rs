//! Shared HTTP transport for OpenAI-compatible chat endpoints.
//!
//! [`HttpClient`] wraps a `reqwest::Client` with pre-built headers and the
//! endpoint URL. `send()` performs a non-streaming request; `stream()`
//! parses a Server-Sent Events response, skipping the `[DONE]` sentinel.

use crate::wire;
use anyhow::Result;
use async_stream::try_stream;
use futures_core::Stream;
use futures_util::StreamExt;
use reqwest::{
    Client, Method,
    header::{self, HeaderMap, HeaderValue},
};
use serde::Serialize;

/// HTTP transport with pre-configured auth headers and endpoint.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    headers: HeaderMap,
    endpoint: String,
}

impl HttpClient {
    /// Create a transport with Bearer token authentication.
    pub fn bearer(client: Client, key: &str, endpoint: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(header::AUTHORIZATION, format!("Bearer {key}").parse()?);
        Ok(Self {
            client,
            headers,
            endpoint: endpoint.to_owned(),
        })
    }

    /// Send a non-streaming request and deserialize the response as JSON.
    pub async fn send(&self, body: &impl Serialize) -> Result<wire::Response> {
        tracing::trace!("request: {}", serde_json::to_string(body)?);
        let text = self
            .client
            .request(Method::POST, &self.endpoint)
            .headers(self.headers.clone())
            .json(body)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        serde_json::from_str(&text).map_err(Into::into)
    }

    /// Stream an SSE response (OpenAI-compatible format).
    ///
    /// Parses `data: ` prefixed payloads and deserializes each as a
    /// [`wire::Chunk`]; unparseable payloads are logged and skipped.
    pub fn stream(&self, body: &impl Serialize) -> impl Stream<Item = Result<wire::Chunk>> + Send {
        if let Ok(body) = serde_json::to_string(body) {
            tracing::trace!("request: {}", body);
        }
        let request = self
            .client
            .request(Method::POST, &self.endpoint)
            .headers(self.headers.clone())
            .json(body);

        try_stream! {
            let response = request.send().await?.error_for_status()?;
            let mut stream = response.bytes_stream();
            while let Some(next) = stream.next().await {
                let bytes = next?;
                let text = String::from_utf8_lossy(&bytes);
                tracing::trace!("chunk: {}", text);
                for data in text.split("data: ").skip(1).filter(|s| !s.starts_with("[DONE]")) {
                    let trimmed = data.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<wire::Chunk>(trimmed) {
                        Ok(chunk) => yield chunk,
                        Err(e) => tracing::warn!("failed to parse chunk: {e}, data: {trimmed}"),
                    }
                }
            }
        }
    }

    /// Get the endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}
