//! Error taxonomy shared across the workspace.

use compact_str::CompactString;
use std::path::PathBuf;
use thiserror::Error;

/// Configuration source failures.
///
/// `Missing`, `Empty` and `Parse` are fatal at startup; during a live reload
/// they are logged and the previous configuration stays in effect.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration source does not exist.
    #[error("model configuration file not found: {0}")]
    Missing(PathBuf),

    /// The source parsed but defined zero models.
    #[error("model configuration is empty, define at least one model")]
    Empty,

    /// The source is not valid TOML (or a table has the wrong shape).
    #[error("malformed model configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A non-empty name was requested that no configuration carries.
    #[error("model configuration '{0}' does not exist")]
    NotFound(CompactString),
}

/// Backend construction failures.
///
/// These fail fast, before any request is served. Transport failures at
/// request time never surface here; adapters turn them into reply text.
#[derive(Debug, Error)]
pub enum BackendError {
    /// A required configuration field is absent for the selected loader.
    #[error("loader '{loader}' requires the '{field}' field")]
    MissingField {
        loader: &'static str,
        field: &'static str,
    },

    /// The HTTP transport could not be assembled from the configuration.
    #[error("failed to build transport for '{loader}': {reason}")]
    Transport {
        loader: &'static str,
        reason: String,
    },
}

/// History store failures.
///
/// The orchestrator degrades these to an empty-history run; they never
/// escape a reply path.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// The underlying store rejected the operation.
    #[error("history store unavailable: {0}")]
    Unavailable(String),
}
