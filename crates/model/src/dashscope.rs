//! DashScope adapter (compatible mode).
//!
//! Speaks the same chat completions protocol as [`OpenAi`](crate::OpenAi)
//! but accepts image inputs: local paths become `file://` URLs in
//! multimodal content arrays, for the current turn and for history turns
//! that carried images.

use crate::{HttpClient, chat, wire};
use futures_core::Stream;
use serde_json::{Value, json};
use tcore::{Backend, BackendError, Call, ModelConfig, Reply, StreamEvent};

const ENDPOINT: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1/chat/completions";

/// Prompt used when images arrive without any text.
const DESCRIBE_PROMPT: &str = "Describe the image content.";

/// DashScope chat completions backend, vision capable.
#[derive(Clone)]
pub struct DashScope {
    http: HttpClient,
    request: wire::Request,
}

impl DashScope {
    /// Build the adapter from a configuration.
    pub fn new(config: &ModelConfig, client: reqwest::Client) -> Result<Self, BackendError> {
        if config.model.is_empty() {
            return Err(BackendError::MissingField {
                loader: "dashscope",
                field: "model",
            });
        }
        if config.api_key.is_empty() {
            return Err(BackendError::MissingField {
                loader: "dashscope",
                field: "api_key",
            });
        }
        let endpoint = config.api_host.as_deref().unwrap_or(ENDPOINT);
        let http = HttpClient::bearer(client, &config.api_key, endpoint).map_err(|e| {
            BackendError::Transport {
                loader: "dashscope",
                reason: e.to_string(),
            }
        })?;
        Ok(Self {
            http,
            request: wire::Request::from_config(config),
        })
    }

    /// Message list with multimodal content arrays where images apply.
    fn messages(&self, call: &Call) -> Vec<wire::Message> {
        if call.images.is_empty() && call.history.iter().all(|t| t.images.is_empty()) {
            return chat::messages(call);
        }

        let mut messages = Vec::with_capacity(call.history.len() * 2 + 2);
        if let Some(system) = &call.system {
            messages.push(wire::Message::system(system));
        }
        for turn in &call.history {
            messages.push(if turn.images.is_empty() {
                wire::Message::user(&turn.message)
            } else {
                wire::Message::user_parts(vision_parts(&turn.message, &turn.images))
            });
            messages.push(wire::Message::assistant(&turn.reply));
        }
        messages.push(if call.images.is_empty() {
            wire::Message::user(&call.prompt)
        } else {
            wire::Message::user_parts(vision_parts(&call.prompt, &call.images))
        });
        messages
    }

    fn request(&self, call: &Call) -> wire::Request {
        self.request
            .clone()
            .messages(self.messages(call))
            .tools(&call.tools)
    }
}

impl Backend for DashScope {
    async fn ask(&self, call: &Call) -> Reply {
        chat::send(&self.http, self.request(call)).await
    }

    fn ask_stream(&self, call: Call) -> impl Stream<Item = StreamEvent> + Send {
        chat::stream(self.http.clone(), self.request(&call).stream())
    }

    fn multimodal(&self) -> bool {
        true
    }
}

/// Content parts for one user message: every image, then the text.
fn vision_parts(prompt: &str, images: &[String]) -> Vec<Value> {
    let mut parts: Vec<Value> = images
        .iter()
        .map(|path| {
            json!({
                "type": "image_url",
                "image_url": { "url": image_url(path) },
            })
        })
        .collect();
    let text = if prompt.is_empty() {
        DESCRIBE_PROMPT
    } else {
        prompt
    };
    parts.push(json!({ "type": "text", "text": text }));
    parts
}

/// Turn a local path into a `file://` URL; pass URLs through.
fn image_url(path: &str) -> String {
    if path.starts_with("http") || path.starts_with("file") {
        return path.to_owned();
    }
    match std::path::absolute(path) {
        Ok(abs) => format!("file://{}", abs.display()),
        Err(_) => format!("file://{path}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vision_parts_put_text_last() {
        let parts = vision_parts("what is this", &["https://host/a.png".into()]);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["type"], "image_url");
        assert_eq!(parts[0]["image_url"]["url"], "https://host/a.png");
        assert_eq!(parts[1]["text"], "what is this");
    }

    #[test]
    fn empty_prompt_gets_describe_default() {
        let parts = vision_parts("", &["a.png".into()]);
        assert_eq!(parts[1]["text"], DESCRIBE_PROMPT);
    }

    #[test]
    fn local_path_becomes_file_url() {
        let url = image_url("photos/cat.png");
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("photos/cat.png"));
    }
}
