//! Hot-reloadable model configuration registry.
//!
//! The registry is the single source of truth for "what configuration is
//! active". It loads an ordered set of named [`ModelConfig`] tables from a
//! TOML file, resolves the default (explicit `default = true` wins, else
//! the first table), and republishes a new snapshot atomically when the
//! file changes on disk.
//!
//! Readers clone an `Arc` of the current snapshot and never observe a
//! partially-updated state; the swap is the sole mutation point. Listeners
//! receive `(new_default, old_default)` over a channel so the watcher task
//! never runs subscriber code while holding a lock. A reload that fails to
//! parse leaves the previous snapshot fully intact and notifies nobody.
//!
//! The registry is explicitly constructed and passed to its consumers;
//! "only one instance" is a construction-time decision, not a runtime
//! check.

use compact_str::CompactString;
use parking_lot::{Mutex, RwLock};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, SystemTime},
};
use tcore::{ConfigError, ModelConfig};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// How often the watcher polls the source for modifications.
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// One loaded configuration set.
///
/// Snapshots are immutable; a reload builds a new one and swaps the `Arc`.
#[derive(Debug)]
pub struct Snapshot {
    /// Configurations in source order.
    configs: Vec<(CompactString, Arc<ModelConfig>)>,
    /// Name of the resolved default.
    default: CompactString,
}

impl Snapshot {
    fn parse(text: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = text.parse()?;
        if table.is_empty() {
            return Err(ConfigError::Empty);
        }

        let mut configs = Vec::with_capacity(table.len());
        for (name, value) in table {
            let config: ModelConfig = value.try_into()?;
            configs.push((CompactString::from(name), Arc::new(config)));
        }

        let default = configs
            .iter()
            .find(|(_, config)| config.default)
            .unwrap_or(&configs[0])
            .0
            .clone();

        Ok(Self { configs, default })
    }

    /// The resolved default configuration.
    pub fn default_config(&self) -> Arc<ModelConfig> {
        self.get(&self.default).expect("default always resolves")
    }

    /// Look up a configuration by name.
    pub fn get(&self, name: &str) -> Option<Arc<ModelConfig>> {
        self.configs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, config)| Arc::clone(config))
    }

    /// Configuration names in source order.
    pub fn names(&self) -> Vec<CompactString> {
        self.configs.iter().map(|(name, _)| name.clone()).collect()
    }
}

/// A default-configuration change delivered to subscribers.
#[derive(Debug, Clone)]
pub struct ConfigChange {
    /// The freshly loaded default.
    pub new: Arc<ModelConfig>,
    /// The default it replaced.
    pub old: Arc<ModelConfig>,
}

/// Hot-reloadable registry of named model configurations.
pub struct Registry {
    path: PathBuf,
    snapshot: RwLock<Arc<Snapshot>>,
    listeners: Mutex<BTreeMap<CompactString, UnboundedSender<ConfigChange>>>,
}

impl Registry {
    /// Load the registry from a TOML source.
    ///
    /// Fails when the file is absent, malformed, or defines zero models.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_owned();
        let snapshot = Self::read(&path)?;
        tracing::info!(
            "loaded {} model configuration(s), default '{}'",
            snapshot.configs.len(),
            snapshot.default,
        );
        Ok(Self {
            path,
            snapshot: RwLock::new(Arc::new(snapshot)),
            listeners: Mutex::new(BTreeMap::new()),
        })
    }

    fn read(path: &Path) -> Result<Snapshot, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::Missing(path.to_owned()));
        }
        let text = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::Missing(path.to_owned()))?;
        Snapshot::parse(&text)
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot.read())
    }

    /// The current default configuration.
    pub fn default_config(&self) -> Arc<ModelConfig> {
        self.snapshot().default_config()
    }

    /// Get a configuration: the named one, or the default when `name` is
    /// empty or absent.
    pub fn get(&self, name: Option<&str>) -> Result<Arc<ModelConfig>, ConfigError> {
        let snapshot = self.snapshot();
        match name {
            None | Some("") => Ok(snapshot.default_config()),
            Some(name) => snapshot
                .get(name)
                .ok_or_else(|| ConfigError::NotFound(CompactString::from(name))),
        }
    }

    /// Re-read the source and swap the snapshot, notifying subscribers.
    ///
    /// On failure the previous snapshot stays in effect and nobody is
    /// notified.
    pub fn reload(&self) -> Result<(), ConfigError> {
        let next = Arc::new(Self::read(&self.path)?);
        let new = next.default_config();

        let old = {
            let mut snapshot = self.snapshot.write();
            let old = snapshot.default_config();
            *snapshot = next;
            old
        };

        // Senders are collected under the lock; delivery happens outside it.
        let senders: Vec<_> = {
            let listeners = self.listeners.lock();
            listeners.values().cloned().collect()
        };
        let change = ConfigChange {
            new: Arc::clone(&new),
            old,
        };
        for sender in senders {
            let _ = sender.send(change.clone());
        }

        tracing::info!("configuration reloaded, default '{}'", new.model);
        Ok(())
    }

    /// Register a named listener. Returns `None` when the name is already
    /// registered; a duplicate subscription is a no-op.
    pub fn subscribe(&self, name: &str) -> Option<UnboundedReceiver<ConfigChange>> {
        let mut listeners = self.listeners.lock();
        if listeners.contains_key(name) {
            return None;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        listeners.insert(CompactString::from(name), tx);
        Some(rx)
    }

    /// Remove a listener. Unsubscribing an unknown name is a no-op.
    pub fn unsubscribe(&self, name: &str) -> bool {
        self.listeners.lock().remove(name).is_some()
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Run the change detector until the registry is dropped.
    ///
    /// Polls the source's modification time; a change triggers a
    /// [`reload`](Self::reload). Reload failures are logged and the running
    /// process keeps the previous configuration.
    pub fn watch(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let registry = Arc::downgrade(self);
        let path = self.path.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(POLL_INTERVAL);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut seen = modified(&path);
            loop {
                interval.tick().await;
                let Some(registry) = registry.upgrade() else {
                    return;
                };
                let current = modified(&path);
                if current == seen {
                    continue;
                }
                seen = current;
                if let Err(e) = registry.reload() {
                    tracing::error!("configuration reload failed: {e}");
                }
            }
        })
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}
