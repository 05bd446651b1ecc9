//! Tests for the configuration registry.

use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tcore::{ConfigError, LoaderKind};
use tern_registry::Registry;

const TWO_MODELS: &str = r#"
[alpha]
loader = "openai"
model = "alpha-chat"
api_key = "k1"
default = true

[beta]
loader = "dashscope"
model = "beta-vl"
api_key = "k2"
multimodal = true
"#;

const FIRST_WINS: &str = r#"
[first]
loader = "openai"
model = "first-chat"
api_key = "k"

[second]
loader = "openai"
model = "second-chat"
api_key = "k"
"#;

fn write_config(dir: &tempfile::TempDir, text: &str) -> std::path::PathBuf {
    let path = dir.path().join("models.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(text.as_bytes()).unwrap();
    path
}

/// Rewrite the source and push its mtime forward so the watcher sees it.
fn rewrite_config(path: &std::path::Path, text: &str) {
    std::fs::write(path, text).unwrap();
    let file = std::fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(5))
        .unwrap();
}

#[test]
fn explicit_default_flag_wins() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::load(write_config(&dir, TWO_MODELS)).unwrap();
    assert_eq!(registry.default_config().model, "alpha-chat");
}

#[test]
fn first_entry_is_default_without_flag() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::load(write_config(&dir, FIRST_WINS)).unwrap();
    assert_eq!(registry.default_config().model, "first-chat");
}

#[test]
fn missing_file_is_a_startup_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = Registry::load(dir.path().join("absent.toml"));
    assert!(matches!(result, Err(ConfigError::Missing(_))));
}

#[test]
fn empty_file_is_a_startup_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = Registry::load(write_config(&dir, ""));
    assert!(matches!(result, Err(ConfigError::Empty)));
}

#[test]
fn get_by_name_and_unknown() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::load(write_config(&dir, TWO_MODELS)).unwrap();

    let beta = registry.get(Some("beta")).unwrap();
    assert_eq!(beta.loader, LoaderKind::DashScope);
    assert!(beta.multimodal);

    let err = registry.get(Some("gamma")).unwrap_err();
    assert!(matches!(err, ConfigError::NotFound(name) if name == "gamma"));
}

#[test]
fn empty_name_resolves_the_default() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::load(write_config(&dir, TWO_MODELS)).unwrap();
    assert_eq!(registry.get(None).unwrap().model, "alpha-chat");
    assert_eq!(registry.get(Some("")).unwrap().model, "alpha-chat");
}

#[test]
fn snapshot_keeps_source_order() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::load(write_config(&dir, TWO_MODELS)).unwrap();
    assert_eq!(registry.snapshot().names(), vec!["alpha", "beta"]);
}

#[tokio::test]
async fn reload_swaps_default_and_notifies() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, TWO_MODELS);
    let registry = Registry::load(&path).unwrap();
    let mut rx = registry.subscribe("test").unwrap();

    let rewritten = r#"
[alpha]
loader = "openai"
model = "alpha-chat"
api_key = "k1"

[beta]
loader = "dashscope"
model = "beta-vl"
api_key = "k2"
default = true
"#;
    rewrite_config(&path, rewritten);
    registry.reload().unwrap();
    assert_eq!(registry.default_config().model, "beta-vl");

    let change = rx.recv().await.unwrap();
    assert_eq!(change.new.model, "beta-vl");
    assert_eq!(change.old.model, "alpha-chat");
}

#[tokio::test]
async fn malformed_reload_keeps_previous_and_notifies_nobody() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, TWO_MODELS);
    let registry = Registry::load(&path).unwrap();
    let mut rx = registry.subscribe("test").unwrap();

    rewrite_config(&path, "not even [toml");
    assert!(registry.reload().is_err());

    assert_eq!(registry.default_config().model, "alpha-chat");
    assert_eq!(registry.get(Some("beta")).unwrap().model, "beta-vl");
    assert!(rx.try_recv().is_err());
}

#[test]
fn duplicate_subscription_is_a_noop() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::load(write_config(&dir, TWO_MODELS)).unwrap();
    assert!(registry.subscribe("runtime").is_some());
    assert!(registry.subscribe("runtime").is_none());
    assert_eq!(registry.listener_count(), 1);

    assert!(registry.unsubscribe("runtime"));
    assert!(!registry.unsubscribe("runtime"));
    assert_eq!(registry.listener_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn watcher_picks_up_a_rewrite() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, TWO_MODELS);
    let registry = Arc::new(Registry::load(&path).unwrap());
    let mut rx = registry.subscribe("test").unwrap();
    let handle = registry.watch();

    let rewritten = TWO_MODELS.replace(
        "model = \"alpha-chat\"\napi_key = \"k1\"\ndefault = true",
        "model = \"alpha-next\"\napi_key = \"k1\"\ndefault = true",
    );
    rewrite_config(&path, &rewritten);

    let change = rx.recv().await.unwrap();
    assert_eq!(change.new.model, "alpha-next");
    assert_eq!(change.old.model, "alpha-chat");
    assert_eq!(registry.default_config().model, "alpha-next");

    handle.abort();
}
