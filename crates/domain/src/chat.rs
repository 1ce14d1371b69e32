use crate::document::{format_content, Document};
use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Conversation turns
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// One message of a conversation. Order within a conversation is significant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A provider-agnostic chat request, as handed over by the HTTP boundary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// The new user message.
    pub message: String,
    /// Upstream conversation id. Present means continuation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    /// Earlier turns, oldest first. Only used when continuing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prior_turns: Vec<ChatTurn>,
    #[serde(default)]
    pub streaming: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn streaming(mut self) -> Self {
        self.streaming = true;
        self
    }

    pub fn with_chat_id(mut self, chat_id: impl Into<String>) -> Self {
        self.chat_id = Some(chat_id.into());
        self
    }

    pub fn with_prior_turns(mut self, turns: Vec<ChatTurn>) -> Self {
        self.prior_turns = turns;
        self
    }

    pub fn with_attachment(mut self, url: impl Into<String>) -> Self {
        self.attachments.push(Attachment { url: url.into() });
        self
    }

    /// The conversation id to continue, if the request carries a non-empty one.
    pub fn continuation_id(&self) -> Option<&str> {
        self.chat_id.as_deref().filter(|id| !id.is_empty())
    }

    /// The turns sent upstream for a new conversation: just the user message.
    pub fn opening(&self) -> Vec<ChatTurn> {
        vec![ChatTurn::user(self.message.clone())]
    }

    /// Prior turns followed by the new user message.
    pub fn conversation(&self) -> Vec<ChatTurn> {
        let mut turns = Vec::with_capacity(self.prior_turns.len() + 1);
        turns.extend(self.prior_turns.iter().cloned());
        turns.push(ChatTurn::user(self.message.clone()));
        turns
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Document>,
}

/// Synchronous chat result. `id` is the join key the ownership store persists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<ResponseMessage>>,
}

impl ChatResponse {
    /// Echo `turns` with ordinal ids and append the assistant reply, which
    /// also carries its formatted [`Document`].
    pub fn from_exchange(id: String, turns: &[ChatTurn], reply: &str) -> Self {
        let mut messages: Vec<ResponseMessage> = turns
            .iter()
            .enumerate()
            .map(|(i, turn)| ResponseMessage {
                id: message_id(i),
                role: turn.role,
                content: turn.content.clone(),
                structured_content: None,
            })
            .collect();

        messages.push(ResponseMessage {
            id: message_id(turns.len()),
            role: Role::Assistant,
            content: reply.to_string(),
            structured_content: Some(format_content(reply)),
        });

        Self {
            id,
            messages: Some(messages),
        }
    }

    /// The last assistant message, if any.
    pub fn reply(&self) -> Option<&ResponseMessage> {
        self.messages
            .as_ref()?
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
    }
}

fn message_id(ordinal: usize) -> String {
    format!("msg-{ordinal}")
}

/// Generate a conversation id: unix millis plus a random hex suffix.
///
/// Collisions are unlikely, not impossible.
pub fn new_chat_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("chat-{millis}-{}", &suffix[..8])
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Block;
    use serde_json::json;

    #[test]
    fn inbound_request_uses_camel_case() {
        let req: ChatRequest = serde_json::from_value(json!({
            "message": "hi",
            "chatId": "chat-1",
            "streaming": true,
            "attachments": [{"url": "https://example.com/cat.png"}]
        }))
        .unwrap();
        assert_eq!(req.chat_id.as_deref(), Some("chat-1"));
        assert!(req.streaming);
        assert_eq!(req.attachments[0].url, "https://example.com/cat.png");
        assert!(req.prior_turns.is_empty());
    }

    #[test]
    fn streaming_defaults_to_false() {
        let req: ChatRequest = serde_json::from_value(json!({"message": "hi"})).unwrap();
        assert!(!req.streaming);
        assert!(req.chat_id.is_none());
    }

    #[test]
    fn empty_chat_id_is_not_a_continuation() {
        assert_eq!(ChatRequest::new("x").with_chat_id("").continuation_id(), None);
        assert_eq!(ChatRequest::new("x").continuation_id(), None);
        assert_eq!(
            ChatRequest::new("x").with_chat_id("chat-7").continuation_id(),
            Some("chat-7")
        );
    }

    #[test]
    fn conversation_appends_new_message_after_prior_turns() {
        let req = ChatRequest::new("C")
            .with_prior_turns(vec![ChatTurn::user("A"), ChatTurn::assistant("B")]);
        let turns = req.conversation();
        let contents: Vec<&str> = turns.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["A", "B", "C"]);
        assert_eq!(turns[2].role, Role::User);
    }

    #[test]
    fn exchange_echoes_turns_with_ordinal_ids() {
        let turns = vec![ChatTurn::user("A"), ChatTurn::assistant("B"), ChatTurn::user("C")];
        let resp = ChatResponse::from_exchange("chat-x".into(), &turns, "D\n\nE");
        let messages = resp.messages.as_ref().unwrap();
        let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["msg-0", "msg-1", "msg-2", "msg-3"]);
        assert!(messages[..3].iter().all(|m| m.structured_content.is_none()));

        let reply = resp.reply().unwrap();
        assert_eq!(reply.content, "D\n\nE");
        assert_eq!(
            reply.structured_content.as_ref().unwrap().blocks(),
            &[Block::paragraph("D"), Block::paragraph("E")]
        );
    }

    #[test]
    fn response_serializes_structured_content_in_camel_case() {
        let resp = ChatResponse::from_exchange("c".into(), &[ChatTurn::user("q")], "a");
        let v = serde_json::to_value(&resp).unwrap();
        assert_eq!(v["messages"][1]["structuredContent"], json!([[0, "a"]]));
        assert!(v["messages"][0].get("structuredContent").is_none());
    }

    #[test]
    fn chat_ids_are_prefixed_and_distinct() {
        let a = new_chat_id();
        let b = new_chat_id();
        assert!(a.starts_with("chat-"));
        assert_ne!(a, b);
    }
}
