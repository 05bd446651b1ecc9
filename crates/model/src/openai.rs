//! OpenAI-compatible adapter.
//!
//! Covers any endpoint speaking the chat completions protocol (OpenAI
//! itself, or a self-hosted server via `api_host`). Text only.

use crate::{HttpClient, chat, wire};
use futures_core::Stream;
use tcore::{Backend, BackendError, Call, ModelConfig, Reply, StreamEvent};

const ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI-compatible chat completions backend.
#[derive(Clone)]
pub struct OpenAi {
    http: HttpClient,
    request: wire::Request,
}

impl OpenAi {
    /// Build the adapter from a configuration.
    ///
    /// Requires `model` and `api_key`; `api_host` overrides the default
    /// endpoint.
    pub fn new(config: &ModelConfig, client: reqwest::Client) -> Result<Self, BackendError> {
        if config.model.is_empty() {
            return Err(BackendError::MissingField {
                loader: "openai",
                field: "model",
            });
        }
        if config.api_key.is_empty() {
            return Err(BackendError::MissingField {
                loader: "openai",
                field: "api_key",
            });
        }
        let endpoint = config.api_host.as_deref().unwrap_or(ENDPOINT);
        let http = HttpClient::bearer(client, &config.api_key, endpoint).map_err(|e| {
            BackendError::Transport {
                loader: "openai",
                reason: e.to_string(),
            }
        })?;
        Ok(Self {
            http,
            request: wire::Request::from_config(config),
        })
    }

    fn request(&self, call: &Call) -> wire::Request {
        self.request
            .clone()
            .messages(chat::messages(call))
            .tools(&call.tools)
    }
}

impl Backend for OpenAi {
    async fn ask(&self, call: &Call) -> Reply {
        chat::send(&self.http, self.request(call)).await
    }

    fn ask_stream(&self, call: Call) -> impl Stream<Item = StreamEvent> + Send {
        chat::stream(self.http.clone(), self.request(&call).stream())
    }
}
