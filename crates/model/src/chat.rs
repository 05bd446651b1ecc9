//! Shared request/response handling for the HTTP adapters.
//!
//! Transport failures are recovered here: they come back as reply text with
//! `succeeded = false`, never as errors, preserving the one-reply-per-request
//! contract. Reasoner models that deliver reasoning out of band get it
//! re-joined into the marker convention so the splitter sees one format.

use crate::{HttpClient, wire};
use async_stream::stream;
use futures_core::Stream;
use futures_util::StreamExt;
use tcore::{Call, Completion, Reply, StreamEvent, THINK_CLOSE, THINK_OPEN};

/// Plain-text message list for a call: system, history pairs, prompt.
pub(crate) fn messages(call: &Call) -> Vec<wire::Message> {
    let mut messages = Vec::with_capacity(call.history.len() * 2 + 2);
    if let Some(system) = &call.system {
        messages.push(wire::Message::system(system));
    }
    for turn in &call.history {
        messages.push(wire::Message::user(&turn.message));
        messages.push(wire::Message::assistant(&turn.reply));
    }
    messages.push(wire::Message::user(&call.prompt));
    messages
}

/// Send a non-streaming request and fold the outcome into a [`Reply`].
pub(crate) async fn send(http: &HttpClient, body: wire::Request) -> Reply {
    match http.send(&body).await {
        Ok(response) => {
            let tokens = response.usage.map(|u| u.total_tokens);
            let Some(choice) = response.choices.into_iter().next() else {
                tracing::error!("model returned no choices");
                return Reply::failed("(model returned an empty response)");
            };
            let content = choice.message.content.unwrap_or_default();
            let text = match choice.message.reasoning_content {
                Some(reasoning) if !reasoning.is_empty() => {
                    format!("{THINK_OPEN}{reasoning}{THINK_CLOSE}{content}")
                }
                _ => content,
            };
            Reply::ok(text, tokens)
        }
        Err(e) => {
            tracing::error!("model request failed: {e}");
            Reply::failed(format!("(model request failed: {e})"))
        }
    }
}

/// Drive a streaming request, yielding fragments and a terminal
/// [`StreamEvent::Done`].
///
/// Reasoning deltas get a synthetic opening marker on the first one and a
/// closing marker glued onto the first answer delta that follows.
pub(crate) fn stream(
    http: HttpClient,
    body: wire::Request,
) -> impl Stream<Item = StreamEvent> + Send {
    stream! {
        let inner = http.stream(&body);
        futures_util::pin_mut!(inner);

        let mut tokens = None;
        let mut reasoning = false;
        while let Some(next) = inner.next().await {
            let chunk = match next {
                Ok(chunk) => chunk,
                Err(e) => {
                    tracing::error!("model stream failed: {e}");
                    yield StreamEvent::Fragment(format!("(model stream failed: {e})"));
                    yield StreamEvent::Done(Completion::default());
                    return;
                }
            };

            if let Some(usage) = chunk.usage {
                tokens = Some(usage.total_tokens);
            }
            let Some(choice) = chunk.choices.into_iter().next() else {
                continue;
            };
            let content = choice.delta.content.unwrap_or_default();
            let thinking = choice.delta.reasoning_content.unwrap_or_default();

            if !thinking.is_empty() && content.is_empty() {
                yield StreamEvent::Fragment(if reasoning {
                    thinking
                } else {
                    reasoning = true;
                    format!("{THINK_OPEN}{thinking}")
                });
            } else if !content.is_empty() {
                yield StreamEvent::Fragment(if reasoning {
                    reasoning = false;
                    format!("{THINK_CLOSE}{content}")
                } else {
                    content
                });
            }
        }

        yield StreamEvent::Done(Completion {
            succeeded: true,
            tokens,
        });
    }
}
