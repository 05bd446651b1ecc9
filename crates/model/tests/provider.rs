//! Tests for provider construction and the scripted mock backend.

use futures_util::StreamExt;
use tern_model::{Mock, Provider, build_provider};
use tcore::{Backend, Call, ModelConfig, StreamEvent};

fn config(toml: &str) -> ModelConfig {
    toml::from_str(toml).unwrap()
}

fn collect(events: Vec<StreamEvent>) -> (Vec<String>, Option<tcore::Completion>) {
    let mut fragments = Vec::new();
    let mut done = None;
    for event in events {
        match event {
            StreamEvent::Fragment(text) => fragments.push(text),
            StreamEvent::Done(completion) => done = Some(completion),
        }
    }
    (fragments, done)
}

// --- construction ---

#[test]
fn openai_requires_api_key() {
    let config = config(
        r#"
        loader = "openai"
        model = "gpt-4o"
        "#,
    );
    let err = build_provider(&config, reqwest::Client::new()).unwrap_err();
    assert!(err.to_string().contains("api_key"));
}

#[test]
fn openai_requires_model() {
    let config = config(
        r#"
        loader = "openai"
        model = ""
        api_key = "k"
        "#,
    );
    let err = build_provider(&config, reqwest::Client::new()).unwrap_err();
    assert!(err.to_string().contains("model"));
}

#[test]
fn dashscope_builds_and_is_multimodal() {
    let config = config(
        r#"
        loader = "dashscope"
        model = "qwen-vl-max"
        api_key = "k"
        "#,
    );
    let provider = build_provider(&config, reqwest::Client::new()).unwrap();
    assert!(provider.multimodal());
}

#[test]
fn openai_is_text_only() {
    let config = config(
        r#"
        loader = "openai"
        model = "gpt-4o"
        api_key = "k"
        "#,
    );
    let provider = build_provider(&config, reqwest::Client::new()).unwrap();
    assert!(!provider.multimodal());
}

#[test]
fn mock_loader_builds_scripted_backend() {
    let config = config(
        r#"
        loader = "mock"
        model = "alpha"
        "#,
    );
    let provider = build_provider(&config, reqwest::Client::new()).unwrap();
    assert!(matches!(provider, Provider::Mock(_)));
}

// --- mock behavior ---

#[tokio::test]
async fn mock_records_calls() {
    let mock = Mock::new("hello").tokens(7);
    let call = Call {
        prompt: "hi".into(),
        ..Call::default()
    };
    let reply = mock.ask(&call).await;
    assert!(reply.succeeded);
    assert_eq!(reply.text, "hello");
    assert_eq!(reply.tokens, Some(7));
    assert_eq!(mock.last_call().unwrap().prompt, "hi");
}

#[tokio::test]
async fn mock_failing_reports_unsucceeded() {
    let mock = Mock::new("boom").failing();
    let reply = mock.ask(&Call::default()).await;
    assert!(!reply.succeeded);
    assert!(reply.tokens.is_none());
}

#[tokio::test]
async fn mock_stream_yields_chunks_then_done() {
    let mock = Mock::new("unused").chunks(["a", "b"]).tokens(3);
    let events: Vec<_> = mock.ask_stream(Call::default()).collect().await;
    let (fragments, done) = collect(events);
    assert_eq!(fragments, vec!["a", "b"]);
    let done = done.unwrap();
    assert!(done.succeeded);
    assert_eq!(done.tokens, Some(3));
}

#[tokio::test]
async fn mock_stream_degenerate_single_fragment() {
    let mock = Mock::new("whole reply");
    let events: Vec<_> = mock.ask_stream(Call::default()).collect().await;
    let (fragments, done) = collect(events);
    assert_eq!(fragments, vec!["whole reply"]);
    assert!(done.unwrap().succeeded);
}

#[tokio::test]
async fn mock_clones_share_the_call_log() {
    let mock = Mock::new("ok");
    let clone = mock.clone();
    clone.ask(&Call::default()).await;
    assert_eq!(mock.calls().len(), 1);
}
