//! Model configuration records.
//!
//! A configuration source holds an ordered set of named [`ModelConfig`]
//! tables. Records are immutable once loaded; a reload replaces the whole
//! set, and requests that captured the previous `Arc` keep using it.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Backend selection for a model configuration.
///
/// Resolved once at deserialization time, so the runtime dispatches on the
/// variant, never on a name string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoaderKind {
    /// OpenAI-compatible chat completions API.
    OpenAi,
    /// DashScope compatible-mode API (vision capable).
    DashScope,
    /// Scripted in-process backend for tests.
    #[cfg(feature = "testing")]
    Mock,
}

impl LoaderKind {
    /// Loader name as it appears in the configuration source.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::DashScope => "dashscope",
            #[cfg(feature = "testing")]
            Self::Mock => "mock",
        }
    }
}

/// How reasoning markup in model output is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ThoughtMode {
    /// Pass output through untouched.
    #[default]
    Off,
    /// Extract the reasoning block and drop it from the reply.
    Strip,
    /// Extract the reasoning block and keep it as a tagged segment.
    Preserve,
}

/// One named model configuration.
///
/// Generation parameters are opaque to the runtime: they are handed to the
/// backend adapter at construction and never interpreted elsewhere.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelConfig {
    /// Which backend adapter serves this configuration.
    pub loader: LoaderKind,

    /// Model name or path passed to the backend.
    pub model: CompactString,

    /// Whether this entry is the default configuration.
    #[serde(default)]
    pub default: bool,

    /// Whether replies are streamed.
    #[serde(default)]
    pub stream: bool,

    /// Whether the backend accepts image inputs.
    #[serde(default)]
    pub multimodal: bool,

    /// Whether tool schemas are attached to requests.
    #[serde(default)]
    pub function_call: bool,

    /// Reasoning-markup handling for this model.
    #[serde(default)]
    pub think: ThoughtMode,

    /// System prompt text.
    #[serde(default)]
    pub system_prompt: String,

    /// Instruction text prepended to the user message.
    #[serde(default)]
    pub user_instructions: String,

    /// Generate the system prompt from the incoming message.
    #[serde(default)]
    pub auto_system_prompt: bool,

    /// Generate the user instructions from the incoming message.
    #[serde(default)]
    pub auto_user_instructions: bool,

    /// API credential.
    #[serde(default)]
    pub api_key: String,

    /// Endpoint override.
    #[serde(default)]
    pub api_host: Option<String>,

    /// Sampling temperature.
    #[serde(default)]
    pub temperature: Option<f32>,

    /// Top-p sampling.
    #[serde(default)]
    pub top_p: Option<f32>,

    /// Maximum tokens to generate.
    #[serde(default)]
    pub max_tokens: Option<u32>,

    /// Repetition penalty (DashScope).
    #[serde(default)]
    pub repetition_penalty: Option<f32>,

    /// Frequency penalty.
    #[serde(default)]
    pub frequency_penalty: Option<f32>,

    /// Presence penalty.
    #[serde(default)]
    pub presence_penalty: Option<f32>,
}
