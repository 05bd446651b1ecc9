//! The backend capability contract.
//!
//! Every model adapter implements [`Backend`], so the orchestrator is
//! backend-agnostic. Recoverable provider failures (HTTP, transport) are
//! caught inside the adapter and surfaced as reply text with
//! `succeeded = false`; they never propagate as errors. Unrecoverable
//! problems (a missing required config field) fail at construction with a
//! [`BackendError`](crate::BackendError) before any request is served.

use crate::{Tool, Turn};
use futures_core::Stream;

/// One backend invocation.
#[derive(Debug, Clone, Default)]
pub struct Call {
    /// The assembled prompt (instructions + speaker-tagged message).
    pub prompt: String,

    /// Bounded prior exchanges, oldest first.
    pub history: Vec<Turn>,

    /// Image paths for multimodal backends.
    pub images: Vec<String>,

    /// System prompt, when one applies.
    pub system: Option<String>,

    /// Tool schemas the model may call.
    pub tools: Vec<Tool>,
}

/// Outcome of a synchronous backend call.
#[derive(Debug, Clone)]
pub struct Reply {
    /// Reply text: the model output, or a failure description.
    pub text: String,

    /// Whether the call completed normally.
    pub succeeded: bool,

    /// Total token usage, `None` when the provider did not report it.
    pub tokens: Option<u32>,
}

impl Reply {
    /// A successful reply.
    pub fn ok(text: impl Into<String>, tokens: Option<u32>) -> Self {
        Self {
            text: text.into(),
            succeeded: true,
            tokens,
        }
    }

    /// A recovered failure, surfaced as reply text.
    pub fn failed(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            succeeded: false,
            tokens: None,
        }
    }
}

/// Completion marker of a streaming call.
#[derive(Debug, Clone, Copy, Default)]
pub struct Completion {
    /// Whether the stream completed normally.
    pub succeeded: bool,

    /// Total token usage, `None` when the provider did not report it.
    pub tokens: Option<u32>,
}

/// One event in a streaming backend reply.
///
/// Adapters yield any number of `Fragment`s followed by exactly one `Done`.
/// The sequence is lazy, forward-only and non-restartable; a consumer that
/// stops iterating simply abandons it.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// A piece of reply text.
    Fragment(String),

    /// Terminal marker carrying the completion outcome.
    Done(Completion),
}

/// The capability contract every backend adapter satisfies.
pub trait Backend: Clone + Send + Sync {
    /// Warm-up / availability probe. A `false` keeps the adapter installed
    /// but marks it not running; the orchestrator then refuses requests.
    fn load(&self) -> impl Future<Output = bool> + Send {
        async { true }
    }

    /// Full synchronous invocation.
    fn ask(&self, call: &Call) -> impl Future<Output = Reply> + Send;

    /// Streaming invocation.
    fn ask_stream(&self, call: Call) -> impl Stream<Item = StreamEvent> + Send;

    /// Whether the adapter accepts image inputs.
    fn multimodal(&self) -> bool {
        false
    }
}
