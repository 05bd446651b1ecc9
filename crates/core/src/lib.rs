//! Core types and traits for the tern conversation runtime.
//!
//! Everything the other crates share lives here: the model configuration
//! record, the backend capability contract, the conversation turn and the
//! history store contract, the thought splitter, and the error taxonomy.

pub use {
    backend::{Backend, Call, Completion, Reply, StreamEvent},
    config::{LoaderKind, ModelConfig, ThoughtMode},
    error::{BackendError, ConfigError, HistoryError},
    history::{History, MemHistory},
    prompt::{BuiltinPrompts, ChatKind, PromptBook, SpeakerNames},
    thought::{THINK_CLOSE, THINK_OPEN, Segment, ThoughtRender, ThoughtSplitter, split_thoughts},
    tool::{Tool, ToolSource},
    turn::{TIME_FORMAT, Turn},
};

mod backend;
mod config;
mod error;
mod history;
mod prompt;
mod thought;
mod tool;
mod turn;
