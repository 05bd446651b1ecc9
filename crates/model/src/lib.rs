//! Backend adapters for the tern conversation runtime.
//!
//! Each adapter implements the [`Backend`](tcore::Backend) contract; the
//! unified [`Provider`] enum dispatches over them so the runtime is
//! monomorphized on one type. [`build_provider`] constructs the variant a
//! [`ModelConfig`](tcore::ModelConfig) selects.

pub use {
    dashscope::DashScope,
    http::HttpClient,
    openai::OpenAi,
    provider::{Provider, build_provider},
};

#[cfg(feature = "testing")]
pub use mock::Mock;

mod chat;
mod dashscope;
mod http;
#[cfg(feature = "testing")]
mod mock;
mod openai;
mod provider;
pub mod wire;
