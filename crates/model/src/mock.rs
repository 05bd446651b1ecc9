//! Scripted in-process backend for tests.

use async_stream::stream;
use futures_core::Stream;
use parking_lot::Mutex;
use std::sync::Arc;
use tcore::{Backend, Call, Completion, ModelConfig, Reply, StreamEvent};

/// A backend that replies from a script and records every call it serves.
///
/// Clones share the call log, so a test can keep one handle while the
/// runtime owns another.
#[derive(Debug, Clone)]
pub struct Mock {
    text: String,
    chunks: Vec<String>,
    tokens: Option<u32>,
    fail: bool,
    loadable: bool,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl Mock {
    /// A mock that answers every call with `text`.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            chunks: Vec::new(),
            tokens: None,
            fail: false,
            loadable: true,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// The mock a `loader = "mock"` configuration builds: replies name the
    /// model so tests can tell configurations apart.
    pub fn from_config(config: &ModelConfig) -> Self {
        Self::new(format!("reply from {}", config.model))
    }

    /// Stream these fragments instead of the single reply text.
    pub fn chunks(mut self, chunks: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.chunks = chunks.into_iter().map(Into::into).collect();
        self
    }

    /// Report this token usage on completion.
    pub fn tokens(mut self, tokens: u32) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Answer with `succeeded = false`, like a recovered transport failure.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Make `load()` report the backend unusable.
    pub fn unloadable(mut self) -> Self {
        self.loadable = false;
        self
    }

    /// Every call served so far.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// The most recent call, if any.
    pub fn last_call(&self) -> Option<Call> {
        self.calls.lock().last().cloned()
    }
}

impl Backend for Mock {
    fn load(&self) -> impl std::future::Future<Output = bool> + Send {
        let loadable = self.loadable;
        async move { loadable }
    }

    async fn ask(&self, call: &Call) -> Reply {
        self.calls.lock().push(call.clone());
        if self.fail {
            Reply::failed(self.text.clone())
        } else {
            Reply::ok(self.text.clone(), self.tokens)
        }
    }

    fn ask_stream(&self, call: Call) -> impl Stream<Item = StreamEvent> + Send {
        let this = self.clone();
        stream! {
            this.calls.lock().push(call);
            if this.fail {
                yield StreamEvent::Fragment(this.text.clone());
                yield StreamEvent::Done(Completion::default());
                return;
            }
            if this.chunks.is_empty() {
                // Degenerate single-reply backend: exactly one fragment.
                yield StreamEvent::Fragment(this.text.clone());
            } else {
                for chunk in &this.chunks {
                    yield StreamEvent::Fragment(chunk.clone());
                }
            }
            yield StreamEvent::Done(Completion {
                succeeded: true,
                tokens: this.tokens,
            });
        }
    }
}
