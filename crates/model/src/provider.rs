//! Unified provider enum with dispatch over concrete backends.

use crate::{DashScope, OpenAi};
use async_stream::stream;
use futures_core::Stream;
use futures_util::StreamExt;
use tcore::{Backend, BackendError, Call, LoaderKind, ModelConfig, Reply, StreamEvent};

/// Unified backend enum.
///
/// The runtime is monomorphized on `Provider`; the variant is resolved once
/// from the configuration's [`LoaderKind`], never from a name string at
/// request time.
#[derive(Clone)]
pub enum Provider {
    /// OpenAI-compatible chat completions API.
    OpenAi(OpenAi),
    /// DashScope compatible-mode API (vision capable).
    DashScope(DashScope),
    /// Scripted backend for tests.
    #[cfg(feature = "testing")]
    Mock(crate::Mock),
}

/// Construct a `Provider` from a configuration and a shared HTTP client.
pub fn build_provider(
    config: &ModelConfig,
    client: reqwest::Client,
) -> Result<Provider, BackendError> {
    match config.loader {
        LoaderKind::OpenAi => OpenAi::new(config, client).map(Provider::OpenAi),
        LoaderKind::DashScope => DashScope::new(config, client).map(Provider::DashScope),
        #[cfg(feature = "testing")]
        LoaderKind::Mock => Ok(Provider::Mock(crate::Mock::from_config(config))),
    }
}

impl Backend for Provider {
    async fn load(&self) -> bool {
        match self {
            Self::OpenAi(p) => p.load().await,
            Self::DashScope(p) => p.load().await,
            #[cfg(feature = "testing")]
            Self::Mock(p) => p.load().await,
        }
    }

    async fn ask(&self, call: &Call) -> Reply {
        match self {
            Self::OpenAi(p) => p.ask(call).await,
            Self::DashScope(p) => p.ask(call).await,
            #[cfg(feature = "testing")]
            Self::Mock(p) => p.ask(call).await,
        }
    }

    fn ask_stream(&self, call: Call) -> impl Stream<Item = StreamEvent> + Send {
        let this = self.clone();
        stream! {
            match this {
                Provider::OpenAi(p) => {
                    let inner = p.ask_stream(call);
                    futures_util::pin_mut!(inner);
                    while let Some(event) = inner.next().await {
                        yield event;
                    }
                }
                Provider::DashScope(p) => {
                    let inner = p.ask_stream(call);
                    futures_util::pin_mut!(inner);
                    while let Some(event) = inner.next().await {
                        yield event;
                    }
                }
                #[cfg(feature = "testing")]
                Provider::Mock(p) => {
                    let inner = p.ask_stream(call);
                    futures_util::pin_mut!(inner);
                    while let Some(event) = inner.next().await {
                        yield event;
                    }
                }
            }
        }
    }

    fn multimodal(&self) -> bool {
        match self {
            Self::OpenAi(p) => p.multimodal(),
            Self::DashScope(p) => p.multimodal(),
            #[cfg(feature = "testing")]
            Self::Mock(p) => p.multimodal(),
        }
    }
}
