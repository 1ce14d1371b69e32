//! Shared streaming pipeline for provider adapters.
//!
//! Both producers here are pull-driven: the upstream body is read only when
//! the consumer polls for the next event, and dropping the returned stream
//! drops the `reqwest::Response`, which releases the connection.
//!
//! - [`document_stream`] -- reframe a provider-specific body into
//!   `metadata`, full-document `delta`s, and `done`/`error`
//! - [`forward_stream`] -- relay a body that already carries chatmux events

use crate::framing::{snippet, Frame, FrameDecoder, Framing};
use crate::util::{from_reqwest, status_error};
use cm_domain::document::format_content;
use cm_domain::stream::{ChatEvent, ChatStream};
use cm_domain::trace::{StreamOutcome, TraceEvent};
use serde_json::Value;

/// What an adapter pulled out of one upstream frame.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct Extracted {
    /// Incremental assistant text.
    pub text: Option<String>,
    /// The upstream marked its last frame.
    pub finished: bool,
    /// The upstream reported an error in-band.
    pub error: Option<String>,
}

#[cfg(test)]
impl Extracted {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }
}

/// Everything a streaming call needs besides the frame extractor.
pub(crate) struct StreamCall {
    pub provider: String,
    pub chat_id: String,
    pub request: reqwest::RequestBuilder,
    pub framing: Framing,
}

/// Build the normalized event stream for one call.
///
/// Emits `Metadata` before touching the network, then a `Delta` carrying the
/// whole reformatted document each time text is appended, then exactly one
/// `Done` or `Error`.
pub(crate) fn document_stream<F>(call: StreamCall, mut extract: F) -> ChatStream
where
    F: FnMut(&Value) -> Extracted + Send + 'static,
{
    let StreamCall {
        provider,
        chat_id,
        request,
        framing,
    } = call;

    let stream = async_stream::stream! {
        yield ChatEvent::metadata(chat_id.clone());

        let mut response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                let err = from_reqwest(e);
                tracing::warn!(provider = %provider, error = %err, "upstream stream request failed");
                finished(&provider, &chat_id, 0, 0, StreamOutcome::Error);
                yield ChatEvent::error(err);
                return;
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = status_error(&provider, status, &body);
            tracing::warn!(provider = %provider, status = status.as_u16(), "upstream stream rejected");
            finished(&provider, &chat_id, 0, 0, StreamOutcome::Error);
            yield ChatEvent::error(err);
            return;
        }

        let mut decoder = FrameDecoder::new(framing);
        let mut accumulated = String::new();
        let mut deltas = 0usize;
        let mut terminal: Option<ChatEvent> = None;

        while terminal.is_none() {
            let (frames, eof) = match response.chunk().await {
                Ok(Some(bytes)) => (decoder.decode(&bytes), false),
                Ok(None) => (decoder.finish(), true),
                Err(e) => {
                    terminal = Some(ChatEvent::error(from_reqwest(e)));
                    break;
                }
            };

            for frame in frames {
                let value = match frame {
                    Frame::Json(value) => value,
                    Frame::Done => {
                        terminal = Some(ChatEvent::Done);
                        break;
                    }
                };
                let extracted = extract(&value);
                if let Some(text) = extracted.text.filter(|t| !t.is_empty()) {
                    accumulated.push_str(&text);
                    deltas += 1;
                    yield ChatEvent::Delta {
                        document: format_content(&accumulated),
                    };
                }
                if let Some(message) = extracted.error {
                    terminal = Some(ChatEvent::error(format!("provider {provider}: {message}")));
                    break;
                }
                if extracted.finished {
                    terminal = Some(ChatEvent::Done);
                    break;
                }
            }

            if eof && terminal.is_none() {
                terminal = Some(ChatEvent::Done);
            }
        }
        drop(response);

        let terminal = terminal.unwrap_or(ChatEvent::Done);
        let outcome = match terminal {
            ChatEvent::Error { .. } => StreamOutcome::Error,
            _ => StreamOutcome::Done,
        };
        if decoder.skipped() > 0 {
            tracing::debug!(provider = %provider, skipped = decoder.skipped(), "stream had malformed lines");
        }
        finished(&provider, &chat_id, deltas, accumulated.chars().count(), outcome);
        yield terminal;
    };

    Box::pin(stream)
}

/// Relay an upstream body that already speaks the chatmux event shape.
///
/// Events are forwarded as they arrive. If the upstream fails before sending
/// its own `Metadata`, one is synthesized with `fallback_id` so consumers
/// always see metadata first. A body that ends without a terminator ends
/// with `Done`.
pub(crate) fn forward_stream(
    provider: String,
    fallback_id: String,
    request: reqwest::RequestBuilder,
) -> ChatStream {
    let stream = async_stream::stream! {
        let mut metadata_sent = false;

        let mut response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                yield ChatEvent::metadata(fallback_id);
                yield ChatEvent::error(from_reqwest(e));
                return;
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            yield ChatEvent::metadata(fallback_id);
            yield ChatEvent::error(status_error(&provider, status, &body));
            return;
        }

        let mut decoder = FrameDecoder::new(Framing::Sse);
        let mut terminal: Option<ChatEvent> = None;

        while terminal.is_none() {
            let (frames, eof) = match response.chunk().await {
                Ok(Some(bytes)) => (decoder.decode(&bytes), false),
                Ok(None) => (decoder.finish(), true),
                Err(e) => {
                    terminal = Some(ChatEvent::error(from_reqwest(e)));
                    break;
                }
            };

            for frame in frames {
                let event = match frame {
                    Frame::Done => ChatEvent::Done,
                    Frame::Json(value) => match ChatEvent::from_json(&value) {
                        Some(event) => event,
                        None => {
                            tracing::warn!(
                                provider = %provider,
                                payload = %snippet(&value.to_string()),
                                "skipping unrecognized upstream event"
                            );
                            continue;
                        }
                    },
                };

                match event {
                    ChatEvent::Metadata { .. } if metadata_sent => {
                        tracing::warn!(provider = %provider, "dropping repeated upstream metadata");
                    }
                    ChatEvent::Metadata { .. } => {
                        metadata_sent = true;
                        yield event;
                    }
                    event if event.is_terminal() => {
                        terminal = Some(event);
                        break;
                    }
                    event => {
                        if !metadata_sent {
                            metadata_sent = true;
                            yield ChatEvent::metadata(fallback_id.clone());
                        }
                        yield event;
                    }
                }
            }

            if eof && terminal.is_none() {
                terminal = Some(ChatEvent::Done);
            }
        }
        drop(response);

        if !metadata_sent {
            yield ChatEvent::metadata(fallback_id);
        }
        yield terminal.unwrap_or(ChatEvent::Done);
    };

    Box::pin(stream)
}

fn finished(provider: &str, chat_id: &str, deltas: usize, chars: usize, outcome: StreamOutcome) {
    TraceEvent::StreamFinished {
        provider: provider.to_string(),
        chat_id: chat_id.to_string(),
        deltas,
        chars,
        outcome,
    }
    .emit();
}
