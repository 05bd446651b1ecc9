//! The tern orchestrator.
//!
//! [`Runtime`] owns the active configuration and the active backend. It
//! builds prompts, assembles bounded conversation history, drives the
//! backend synchronously or in streaming mode, separates reasoning from
//! answer text, and persists one turn per successful request. A
//! configuration change from the registry hot-swaps the backend without a
//! restart; requests in flight finish on the snapshot they captured.
//!
//! No reply path propagates an error past this crate: every failure mode
//! resolves to a string or a terminated stream.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tern_runtime::{Registry, Runtime};
//! use tcore::MemHistory;
//!
//! let registry = Arc::new(Registry::load("configs/models.toml")?);
//! registry.watch();
//! let runtime = Arc::new(Runtime::new(registry, MemHistory::new()).await.with_epoch(10));
//! runtime.watch();
//! let reply = runtime.ask("hello", "user-1", None, Vec::new(), true).await;
//! ```

pub use {
    model::{Provider, build_provider},
    registry::Registry,
};

use async_stream::stream;
use compact_str::CompactString;
use futures_core::Stream;
use futures_util::StreamExt;
use parking_lot::RwLock;
use std::{collections::HashSet, path::Path, sync::Arc, time::Instant};
use tcore::{
    Backend, BuiltinPrompts, Call, ChatKind, Completion, History, HistoryError, ModelConfig,
    PromptBook, SpeakerNames, StreamEvent, ThoughtMode, ThoughtRender, ThoughtSplitter,
    ToolSource, Turn, split_thoughts,
};
use tokio::task::JoinHandle;

/// Fixed reply served while no backend is running.
const NOT_LOADED: &str = "(model not loaded)";

/// Guidance served when a refresh finds no history to re-issue.
const EMPTY_REFRESH: &str = "there is nothing to refresh yet, send a message first";

/// One backend generation: the configuration it was built from, the adapter
/// instance, and whether `load()` succeeded.
///
/// Engines are immutable; a hot swap stores a new one. Requests clone the
/// `Arc` once and keep using their snapshot even across a swap.
struct Engine {
    config: Arc<ModelConfig>,
    backend: Option<Provider>,
    running: bool,
}

impl Engine {
    fn runnable(&self) -> Option<&Provider> {
        self.backend.as_ref().filter(|_| self.running)
    }
}

/// The orchestrator.
///
/// Generic over the history store; prompt generation, speaker naming and
/// the tool registry are injected collaborators with no-op defaults.
pub struct Runtime<H> {
    registry: Arc<Registry>,
    engine: RwLock<Arc<Engine>>,
    history: H,
    prompts: Arc<dyn PromptBook>,
    names: Arc<dyn SpeakerNames>,
    tools: Arc<dyn ToolSource>,
    epoch: usize,
    client: reqwest::Client,
}

impl<H: History> Runtime<H> {
    /// Build a runtime from the registry's current default configuration
    /// and try to load its backend.
    pub async fn new(registry: Arc<Registry>, history: H) -> Self {
        let client = reqwest::Client::new();
        let engine = build_engine(registry.default_config(), &client).await;
        Self {
            registry,
            engine: RwLock::new(Arc::new(engine)),
            history,
            prompts: Arc::new(BuiltinPrompts),
            names: Arc::new(()),
            tools: Arc::new(()),
            epoch: 0,
            client,
        }
    }

    /// Bound history assembly to the most recent `epoch` turns (0 = no
    /// bound).
    pub fn with_epoch(mut self, epoch: usize) -> Self {
        self.epoch = epoch;
        self
    }

    /// Use this prompt generator for auto system prompts and instructions.
    pub fn with_prompts(mut self, prompts: impl PromptBook + 'static) -> Self {
        self.prompts = Arc::new(prompts);
        self
    }

    /// Use this resolver for group speaker tags.
    pub fn with_names(mut self, names: impl SpeakerNames + 'static) -> Self {
        self.names = Arc::new(names);
        self
    }

    /// Use this tool registry for function calling.
    pub fn with_tools(mut self, tools: impl ToolSource + 'static) -> Self {
        self.tools = Arc::new(tools);
        self
    }

    fn engine(&self) -> Arc<Engine> {
        Arc::clone(&self.engine.read())
    }

    /// Whether the active backend is loaded and serving.
    pub fn running(&self) -> bool {
        self.engine().running
    }

    /// Model name of the active configuration.
    pub fn active_model(&self) -> CompactString {
        self.engine().config.model.clone()
    }

    /// Swap in a backend built from `config`. The swap is a single store;
    /// in-flight requests keep the engine they captured.
    async fn apply(&self, config: Arc<ModelConfig>) {
        let engine = build_engine(config, &self.client).await;
        *self.engine.write() = Arc::new(engine);
    }

    /// React to registry changes until the runtime or registry is dropped.
    ///
    /// Subscribes to the registry and rebuilds the backend on its own task
    /// whenever a new default is published.
    pub fn watch(self: &Arc<Self>) -> JoinHandle<()>
    where
        H: 'static,
    {
        let Some(mut rx) = self.registry.subscribe("runtime") else {
            tracing::warn!("runtime is already watching the registry");
            return tokio::spawn(async {});
        };
        let runtime = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(change) = rx.recv().await {
                let Some(runtime) = runtime.upgrade() else {
                    return;
                };
                tracing::info!(
                    "configuration changed, reloading backend: '{}' -> '{}'",
                    change.old.model,
                    change.new.model,
                );
                runtime.apply(change.new).await;
            }
        })
    }

    /// Load a named configuration (the default when `name` is empty) and
    /// rebuild the backend. Returns a user-visible outcome message.
    pub async fn switch(&self, name: &str) -> String {
        let lookup = if name.is_empty() { None } else { Some(name) };
        let config = match self.registry.get(lookup) {
            Ok(config) => config,
            Err(e) => return e.to_string(),
        };
        self.apply(config).await;
        if name.is_empty() {
            "loaded the default model configuration".to_owned()
        } else {
            format!("loaded model configuration '{name}'")
        }
    }

    /// Ask the active backend and return the full reply.
    ///
    /// The turn is persisted only when the backend call succeeded, and the
    /// stored reply is the answer segment with reasoning stripped.
    pub async fn ask(
        &self,
        message: &str,
        user: &str,
        group: Option<&str>,
        images: Vec<String>,
        use_history: bool,
    ) -> String {
        let engine = self.engine();
        let Some(backend) = engine.runnable() else {
            tracing::error!("model not loaded");
            return NOT_LOADED.to_owned();
        };

        tracing::info!("invoking model '{}'", engine.config.model);
        let call = self.prepare(&engine.config, message, user, group, images.clone(), use_history);
        let started = Instant::now();

        let reply = backend.ask(&call).await;
        tracing::debug!(
            "model call finished in {:.2?} (succeeded: {}, tokens: {:?})",
            started.elapsed(),
            reply.succeeded,
            reply.tokens,
        );

        let (thought, answer) = split_thoughts(&reply.text, engine.config.think);
        if reply.succeeded {
            let turn = Turn::new(user, group, message, answer.trim(), images, reply.tokens);
            if let Err(e) = self.history.append(&turn) {
                tracing::error!("failed to persist turn: {e}");
            }
        }
        render_reply(engine.config.think, &thought, &answer)
    }

    /// Ask the active backend in streaming mode.
    ///
    /// Every fragment runs through the incremental thought splitter; the
    /// full reply is accumulated and persisted once the stream is
    /// exhausted, and only when the backend reported success. Abandoning
    /// the stream persists nothing.
    pub fn ask_stream(
        &self,
        message: &str,
        user: &str,
        group: Option<&str>,
        images: Vec<String>,
        use_history: bool,
    ) -> impl Stream<Item = String> + Send {
        let message = message.to_owned();
        let user = user.to_owned();
        let group = group.map(str::to_owned);
        stream! {
            let engine = self.engine();
            let Some(backend) = engine.runnable() else {
                tracing::error!("model not loaded");
                yield NOT_LOADED.to_owned();
                return;
            };

            tracing::info!("invoking model '{}' in streaming mode", engine.config.model);
            let call = self.prepare(
                &engine.config,
                &message,
                &user,
                group.as_deref(),
                images.clone(),
                use_history,
            );
            let mode = engine.config.think;

            let inner = backend.ask_stream(call);
            futures_util::pin_mut!(inner);

            let mut splitter = ThoughtSplitter::new(mode);
            let mut render = ThoughtRender::new(mode);
            let mut raw = String::new();
            let mut completion = Completion::default();

            while let Some(event) = inner.next().await {
                match event {
                    StreamEvent::Fragment(text) => {
                        raw.push_str(&text);
                        for segment in splitter.push(&text) {
                            if let Some(out) = render.render(segment) {
                                if !out.is_empty() {
                                    yield out;
                                }
                            }
                        }
                    }
                    StreamEvent::Done(done) => completion = done,
                }
            }
            if let Some(segment) = splitter.finish() {
                if let Some(out) = render.render(segment) {
                    if !out.is_empty() {
                        yield out;
                    }
                }
            }

            tracing::debug!(
                "stream finished (succeeded: {}, tokens: {:?})",
                completion.succeeded,
                completion.tokens,
            );
            if completion.succeeded {
                let (_, answer) = split_thoughts(&raw, mode);
                let turn = Turn::new(
                    user.as_str(),
                    group.as_deref(),
                    &message,
                    answer.trim(),
                    images,
                    completion.tokens,
                );
                if let Err(e) = self.history.append(&turn) {
                    tracing::error!("failed to persist turn: {e}");
                }
            }
        }
    }

    /// Pop the user's most recent turn and re-issue it, regenerating the
    /// last answer. Streams when the active configuration streams;
    /// otherwise yields the whole reply as one fragment.
    pub fn refresh(&self, user: &str) -> impl Stream<Item = String> + Send {
        let user = user.to_owned();
        stream! {
            tracing::info!("refresh requested by '{user}'");
            let popped = match self.history.remove_last(&user) {
                Ok(popped) => popped,
                Err(e) => {
                    tracing::warn!("history unavailable: {e}");
                    None
                }
            };
            let Some(turn) = popped else {
                yield EMPTY_REFRESH.to_owned();
                return;
            };

            let group = turn.group.clone();
            if self.engine().config.stream {
                let inner =
                    self.ask_stream(&turn.message, &user, group.as_deref(), turn.images.clone(), true);
                futures_util::pin_mut!(inner);
                while let Some(fragment) = inner.next().await {
                    yield fragment;
                }
            } else {
                yield self
                    .ask(&turn.message, &user, group.as_deref(), turn.images.clone(), true)
                    .await;
            }
        }
    }

    /// Exclude all of the user's turns from future history retrieval. The
    /// turns stay in the store.
    pub async fn reset(&self, user: &str) -> String {
        match self.history.mark_unavailable(user) {
            Ok(()) => "conversation history cleared".to_owned(),
            Err(e) => {
                tracing::warn!("history unavailable: {e}");
                "history is unavailable right now".to_owned()
            }
        }
    }

    /// Physically remove only the user's most recent turn.
    pub async fn undo(&self, user: &str) -> String {
        match self.history.remove_last(user) {
            Ok(Some(_)) => "last exchange withdrawn".to_owned(),
            Ok(None) => "there is no exchange to withdraw".to_owned(),
            Err(e) => {
                tracing::warn!("history unavailable: {e}");
                "history is unavailable right now".to_owned()
            }
        }
    }

    /// Token usage aggregation as `(today, total)`.
    pub fn usage(&self) -> Result<(u64, u64), HistoryError> {
        self.history.usage()
    }

    /// Resolve prompts, history and tools for one backend call.
    fn prepare(
        &self,
        config: &ModelConfig,
        message: &str,
        user: &str,
        group: Option<&str>,
        images: Vec<String>,
        use_history: bool,
    ) -> Call {
        let kind = if group.is_some() {
            ChatKind::Group
        } else {
            ChatKind::Private
        };
        let mut system = config.system_prompt.clone();
        let mut instructions = config.user_instructions.clone();
        if config.auto_system_prompt {
            system = self.prompts.generate(message, kind);
        } else if config.auto_user_instructions {
            instructions = self.prompts.generate(message, kind);
        }

        let body = match group {
            Some(_) => format!("<{}> {message}", self.names.resolve(user)),
            None => message.to_owned(),
        };
        let prompt = if instructions.is_empty() {
            body
        } else {
            format!("{instructions}\n\n{body}")
        };

        let history = if use_history {
            self.assemble_history(user, group)
        } else {
            Vec::new()
        };
        let tools = if config.function_call {
            self.tools.tools()
        } else {
            Vec::new()
        };

        Call {
            prompt,
            history,
            images,
            system: (!system.is_empty()).then_some(system),
            tools,
        }
    }

    /// Fetch, merge and bound the history for one request.
    ///
    /// User turns, plus group turns for group contexts. Duplicates (the
    /// user's own turns in a group fetch) are kept once; the merge orders
    /// by recency with stable ordering and truncates to the epoch bound.
    /// In group contexts every merged turn gets a speaker tag resolved
    /// from its stored user id. A failing store degrades to an empty
    /// history, never an error.
    fn assemble_history(&self, user: &str, group: Option<&str>) -> Vec<Turn> {
        let mut turns = match self.history.user_history(user, self.epoch) {
            Ok(turns) => turns,
            Err(e) => {
                tracing::warn!("history unavailable, continuing without it: {e}");
                return Vec::new();
            }
        };
        prune_missing_images(&mut turns);

        let Some(group) = group else {
            return turns;
        };

        let mut group_turns = match self.history.group_history(group, self.epoch) {
            Ok(turns) => turns,
            Err(e) => {
                tracing::warn!("group history unavailable: {e}");
                Vec::new()
            }
        };
        prune_missing_images(&mut group_turns);

        let mut seen = HashSet::new();
        let mut merged: Vec<Turn> = Vec::with_capacity(turns.len() + group_turns.len());
        for turn in turns.into_iter().chain(group_turns) {
            let key = (turn.time.clone(), turn.user.clone(), turn.message.clone());
            if seen.insert(key) {
                merged.push(turn);
            }
        }
        merged.sort_by(|a, b| a.time.cmp(&b.time));
        if self.epoch > 0 && merged.len() > self.epoch {
            merged.drain(..merged.len() - self.epoch);
        }

        for turn in &mut merged {
            turn.message = format!("<{}> {}", self.names.resolve(&turn.user), turn.message);
        }
        merged
    }

    /// Install an engine directly, bypassing the registry.
    #[cfg(feature = "testing")]
    pub async fn install(&self, config: Arc<ModelConfig>, backend: Provider) {
        let running = backend.load().await;
        *self.engine.write() = Arc::new(Engine {
            config,
            backend: Some(backend),
            running,
        });
    }
}

/// Build an engine for `config`: construct the adapter and probe it.
///
/// A construction or load failure leaves the engine not running; the
/// runtime then serves the fixed not-loaded reply instead of raising.
async fn build_engine(config: Arc<ModelConfig>, client: &reqwest::Client) -> Engine {
    match build_provider(&config, client.clone()) {
        Ok(backend) => {
            let running = backend.load().await;
            if running {
                tracing::info!(
                    "backend '{}' ready via loader '{}'",
                    config.model,
                    config.loader.as_str(),
                );
            } else {
                tracing::error!("backend '{}' failed to load", config.model);
            }
            Engine {
                config,
                backend: Some(backend),
                running,
            }
        }
        Err(e) => {
            tracing::error!("failed to build backend: {e}");
            Engine {
                config,
                backend: None,
                running: false,
            }
        }
    }
}

/// Compose the user-visible reply from the split segments.
fn render_reply(mode: ThoughtMode, thought: &str, answer: &str) -> String {
    match mode {
        ThoughtMode::Off | ThoughtMode::Strip => answer.trim().to_owned(),
        ThoughtMode::Preserve => {
            let thought = thought.trim();
            let answer = answer.trim();
            if thought.is_empty() {
                answer.to_owned()
            } else {
                format!("<think>{thought}</think>\n\n{answer}")
            }
        }
    }
}

fn prune_missing_images(turns: &mut [Turn]) {
    for turn in turns {
        turn.images.retain(|path| Path::new(path).is_file());
    }
}
