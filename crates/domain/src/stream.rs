use crate::chat::ChatResponse;
use crate::document::Document;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use serde_json::{json, Value};
use std::pin::Pin;

/// A boxed async stream, used for chat streaming responses.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

/// Outbound event stream of a single streaming call.
pub type ChatStream = BoxStream<'static, ChatEvent>;

/// Terminator frame of the outbound wire stream.
pub const DONE_FRAME: &str = "data: [DONE]\n\n";

/// Events emitted during a streaming chat call (provider-agnostic).
///
/// A well-formed stream is one `Metadata`, any number of `Delta`s, then
/// exactly one `Done` or `Error`.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// Conversation id for this call. Always first.
    Metadata {
        id: String,
        created_at: DateTime<Utc>,
    },
    /// The full document accumulated so far, not a patch.
    Delta { document: Document },
    /// Upstream finished normally.
    Done,
    /// The call failed. Deltas already sent stay valid partial output.
    Error { message: String },
}

impl ChatEvent {
    pub fn metadata(id: impl Into<String>) -> Self {
        ChatEvent::Metadata {
            id: id.into(),
            created_at: Utc::now(),
        }
    }

    pub fn error(message: impl ToString) -> Self {
        ChatEvent::Error {
            message: message.to_string(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ChatEvent::Done | ChatEvent::Error { .. })
    }

    /// JSON payload of the wire frame. `Done` has none; it is carried by
    /// [`DONE_FRAME`].
    pub fn to_json(&self) -> Option<Value> {
        match self {
            ChatEvent::Metadata { id, created_at } => Some(json!({
                "object": "chat",
                "id": id,
                "createdAt": created_at,
            })),
            ChatEvent::Delta { document } => Some(json!({ "delta": document })),
            ChatEvent::Error { message } => Some(json!({ "error": { "message": message } })),
            ChatEvent::Done => None,
        }
    }

    /// `data: <json>\n\n`, or `None` for `Done`.
    pub fn to_frame(&self) -> Option<String> {
        self.to_json().map(|v| format!("data: {v}\n\n"))
    }

    /// Parse a frame payload produced by [`ChatEvent::to_json`].
    ///
    /// Returns `None` for objects that match no event shape.
    pub fn from_json(value: &Value) -> Option<Self> {
        if value.get("object").and_then(Value::as_str) == Some("chat") {
            let id = value.get("id")?.as_str()?.to_string();
            let created_at = value
                .get("createdAt")
                .and_then(|v| serde_json::from_value(v.clone()).ok())
                .unwrap_or_else(Utc::now);
            return Some(ChatEvent::Metadata { id, created_at });
        }
        if let Some(delta) = value.get("delta") {
            let document = serde_json::from_value(delta.clone()).ok()?;
            return Some(ChatEvent::Delta { document });
        }
        if let Some(err) = value.get("error") {
            let message = err
                .get("message")
                .and_then(Value::as_str)
                .or_else(|| err.as_str())
                .unwrap_or("upstream error")
                .to_string();
            return Some(ChatEvent::Error { message });
        }
        None
    }
}

/// Result of a create/continue call: a complete response or a live stream.
pub enum ChatOutput {
    Complete(ChatResponse),
    Stream(ChatStream),
}

impl ChatOutput {
    pub fn into_complete(self) -> Option<ChatResponse> {
        match self {
            ChatOutput::Complete(resp) => Some(resp),
            ChatOutput::Stream(_) => None,
        }
    }

    pub fn into_stream(self) -> Option<ChatStream> {
        match self {
            ChatOutput::Stream(stream) => Some(stream),
            ChatOutput::Complete(_) => None,
        }
    }
}

impl std::fmt::Debug for ChatOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatOutput::Complete(resp) => f.debug_tuple("Complete").field(resp).finish(),
            ChatOutput::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Encode a chat stream as outbound wire frames.
///
/// Stops after the first terminal event and always ends with exactly one
/// [`DONE_FRAME`], also when the input ends without a terminal event.
pub fn into_sse_frames(mut events: ChatStream) -> BoxStream<'static, String> {
    let stream = async_stream::stream! {
        while let Some(event) = events.next().await {
            let terminal = event.is_terminal();
            if let Some(frame) = event.to_frame() {
                yield frame;
            }
            if terminal {
                break;
            }
        }
        yield DONE_FRAME.to_string();
    };
    Box::pin(stream)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
