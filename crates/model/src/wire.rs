//! OpenAI-compatible wire format.
//!
//! One request body covers every adapter in this crate; optional fields use
//! `skip_serializing_if` so provider-specific extras are simply absent when
//! unused. Response types keep only the fields the runtime consumes.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tcore::{ModelConfig, Tool};

/// Chat completions request body.
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// The model identifier.
    pub model: String,
    /// The messages to send.
    pub messages: Vec<Message>,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Top-p sampling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Maximum tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Repetition penalty (DashScope).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repetition_penalty: Option<f32>,
    /// Frequency penalty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    /// Presence penalty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    /// Whether to stream the response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Stream options (usage reporting).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<Value>,
    /// Tools the model may call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Value>,
}

impl Request {
    /// Build a request template from a model configuration; messages are
    /// filled per call.
    pub fn from_config(config: &ModelConfig) -> Self {
        Self {
            model: config.model.to_string(),
            messages: Vec::new(),
            temperature: config.temperature,
            top_p: config.top_p,
            max_tokens: config.max_tokens,
            repetition_penalty: config.repetition_penalty,
            frequency_penalty: config.frequency_penalty,
            presence_penalty: config.presence_penalty,
            stream: None,
            stream_options: None,
            tools: None,
        }
    }

    /// Set the messages for the request.
    pub fn messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    /// Attach tool schemas, wrapped in the `function` envelope.
    pub fn tools(mut self, tools: &[Tool]) -> Self {
        if tools.is_empty() {
            return self;
        }
        let wrapped = tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": json!(tool),
                })
            })
            .collect::<Vec<_>>();
        self.tools = Some(json!(wrapped));
        self
    }

    /// Enable streaming with usage reporting in the final chunk.
    pub fn stream(mut self) -> Self {
        self.stream = Some(true);
        self.stream_options = Some(json!({ "include_usage": true }));
        self
    }
}

/// One message in a request.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    /// The role of the author.
    pub role: &'static str,
    /// Plain text or a multimodal content array.
    pub content: Value,
}

impl Message {
    /// A system message.
    pub fn system(content: &str) -> Self {
        Self {
            role: "system",
            content: json!(content),
        }
    }

    /// A plain-text user message.
    pub fn user(content: &str) -> Self {
        Self {
            role: "user",
            content: json!(content),
        }
    }

    /// A user message with multimodal content parts.
    pub fn user_parts(parts: Vec<Value>) -> Self {
        Self {
            role: "user",
            content: Value::Array(parts),
        }
    }

    /// An assistant message.
    pub fn assistant(content: &str) -> Self {
        Self {
            role: "assistant",
            content: json!(content),
        }
    }
}

/// A non-streaming chat completion response.
#[derive(Debug, Deserialize)]
pub struct Response {
    /// Completion choices.
    #[serde(default)]
    pub choices: Vec<Choice>,
    /// Token usage statistics.
    pub usage: Option<Usage>,
}

/// One completion choice.
#[derive(Debug, Deserialize)]
pub struct Choice {
    /// The generated message.
    pub message: Delta,
}

/// Message content of a choice or a streaming delta.
#[derive(Debug, Default, Deserialize)]
pub struct Delta {
    /// The content of the message.
    pub content: Option<String>,
    /// Out-of-band reasoning content (reasoner models).
    pub reasoning_content: Option<String>,
}

/// A streaming chat completion chunk.
#[derive(Debug, Deserialize)]
pub struct Chunk {
    /// Completion choices with delta content.
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
    /// Token usage, present in the final chunk only.
    pub usage: Option<Usage>,
}

/// One choice in a streaming chunk.
#[derive(Debug, Deserialize)]
pub struct StreamChoice {
    /// The delta content for this chunk.
    #[serde(default)]
    pub delta: Delta,
}

/// Token usage statistics.
#[derive(Debug, Deserialize)]
pub struct Usage {
    /// Total number of tokens used.
    pub total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ModelConfig {
        toml::from_str(
            r#"
            loader = "openai"
            model = "gpt-4o"
            api_key = "k"
            temperature = 0.7
            "#,
        )
        .unwrap()
    }

    #[test]
    fn absent_params_are_not_serialized() {
        let request = Request::from_config(&config()).messages(vec![Message::user("hi")]);
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["temperature"], json!(0.7));
        assert!(body.get("top_p").is_none());
        assert!(body.get("stream").is_none());
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn stream_sets_usage_option() {
        let request = Request::from_config(&config()).stream();
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["stream"], json!(true));
        assert_eq!(body["stream_options"]["include_usage"], json!(true));
    }

    #[test]
    fn tools_are_wrapped_in_function_envelope() {
        let tool = Tool {
            name: "now".into(),
            description: "current time".into(),
            parameters: json!({"type": "object"}),
        };
        let request = Request::from_config(&config()).tools(std::slice::from_ref(&tool));
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "now");
    }

    #[test]
    fn chunk_parses_reasoning_delta() {
        let chunk: Chunk = serde_json::from_str(
            r#"{"choices":[{"delta":{"reasoning_content":"hmm"}}]}"#,
        )
        .unwrap();
        assert_eq!(
            chunk.choices[0].delta.reasoning_content.as_deref(),
            Some("hmm")
        );
        assert!(chunk.usage.is_none());
    }
}
