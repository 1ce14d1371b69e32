//! OpenAI-compatible adapter (SSE with JSON payloads).
//!
//! Used for OpenAI itself and for LM Studio's local server; the two
//! instances share this code and differ only in their [`ProviderProfile`].
//!
//! Wire contract:
//! - `POST {base}/v1/chat/completions` with
//!   `{model, messages, temperature, max_tokens, stream}`
//! - streaming body: `data: {"choices":[{"delta":{"content":..}}]}` lines,
//!   terminated by `data: [DONE]`
//! - `GET {base}/v1/models` for model discovery

use crate::framing::Framing;
use crate::profile::ProviderProfile;
use crate::stream::{document_stream, Extracted, StreamCall};
use crate::traits::ChatProvider;
use crate::util::{build_client, from_reqwest, resolve_credential, status_error, with_bearer};
use cm_domain::chat::{new_chat_id, Attachment, ChatRequest, ChatResponse, ChatTurn, Role};
use cm_domain::config::{HttpConfig, ProviderConfig};
use cm_domain::error::{Error, Result};
use cm_domain::stream::ChatOutput;
use cm_domain::trace::TraceEvent;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An adapter for any endpoint that follows the OpenAI chat completions
/// contract.
pub struct OpenAiCompatProvider {
    profile: ProviderProfile,
    client: reqwest::Client,
    request_timeout: Duration,
}

impl OpenAiCompatProvider {
    pub fn new(profile: ProviderProfile, http: &HttpConfig) -> Result<Self> {
        Ok(Self {
            profile,
            client: build_client(http)?,
            request_timeout: http.request_timeout(),
        })
    }

    pub fn openai(http: &HttpConfig) -> Result<Self> {
        Self::new(ProviderProfile::openai(), http)
    }

    pub fn lmstudio(http: &HttpConfig) -> Result<Self> {
        Self::new(ProviderProfile::lmstudio(), http)
    }

    async fn chat(
        &self,
        req: &ChatRequest,
        cfg: &ProviderConfig,
        turns: Vec<ChatTurn>,
        chat_id: String,
    ) -> Result<ChatOutput> {
        let api_key = resolve_credential(&self.profile, cfg)?;
        let url = format!(
            "{}/v1/chat/completions",
            cfg.base_url_or(&self.profile.default_base_url)
        );
        let model = cfg.model_or(&self.profile.default_model);
        let body = build_chat_body(&model, &turns, &req.attachments, cfg, req.streaming);

        TraceEvent::UpstreamRequest {
            provider: self.profile.id.clone(),
            model,
            url: url.clone(),
            streaming: req.streaming,
            continuation: req.continuation_id().is_some(),
        }
        .emit();

        let rb = with_bearer(self.client.post(&url).json(&body), api_key.as_deref());

        if req.streaming {
            let call = StreamCall {
                provider: self.profile.id.clone(),
                chat_id,
                request: rb.header("Accept", "text/event-stream"),
                framing: Framing::Sse,
            };
            return Ok(ChatOutput::Stream(document_stream(call, extract_sse_chunk)));
        }

        let started = Instant::now();
        let resp = rb
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        let resp_text = resp.text().await.map_err(from_reqwest)?;

        TraceEvent::UpstreamResponse {
            provider: self.profile.id.clone(),
            status: status.as_u16(),
            duration_ms: started.elapsed().as_millis() as u64,
        }
        .emit();

        if !status.is_success() {
            return Err(status_error(&self.profile.id, status, &resp_text));
        }

        let resp_json: Value = serde_json::from_str(&resp_text)?;
        let reply = parse_chat_reply(&self.profile.id, &resp_json)?;
        Ok(ChatOutput::Complete(ChatResponse::from_exchange(
            chat_id, &turns, &reply,
        )))
    }

    async fn fetch_models(&self, cfg: &ProviderConfig) -> Result<Vec<String>> {
        let url = format!("{}/v1/models", cfg.base_url_or(&self.profile.default_base_url));
        let api_key = cfg.resolved_api_key();

        let resp = with_bearer(self.client.get(&url), api_key.as_deref())
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        let resp_text = resp.text().await.map_err(from_reqwest)?;
        if !status.is_success() {
            return Err(status_error(&self.profile.id, status, &resp_text));
        }

        let resp_json: Value = serde_json::from_str(&resp_text)?;
        Ok(parse_model_list(&resp_json))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message serialization helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Attachments ride on the last user turn as `image_url` parts.
fn build_chat_body(
    model: &str,
    turns: &[ChatTurn],
    attachments: &[Attachment],
    cfg: &ProviderConfig,
    stream: bool,
) -> Value {
    let last_user = turns.iter().rposition(|t| t.role == Role::User);
    let messages: Vec<Value> = turns
        .iter()
        .enumerate()
        .map(|(i, turn)| {
            if Some(i) == last_user && !attachments.is_empty() {
                user_with_attachments(turn, attachments)
            } else {
                json!({"role": turn.role.as_str(), "content": turn.content})
            }
        })
        .collect();

    let mut body = json!({
        "model": model,
        "messages": messages,
        "stream": stream,
    });
    if let Some(temp) = cfg.temperature {
        body["temperature"] = json!(temp);
    }
    if let Some(max) = cfg.max_tokens {
        body["max_tokens"] = json!(max);
    }
    body
}

fn user_with_attachments(turn: &ChatTurn, attachments: &[Attachment]) -> Value {
    let mut parts = vec![json!({"type": "text", "text": turn.content})];
    parts.extend(
        attachments
            .iter()
            .map(|a| json!({"type": "image_url", "image_url": {"url": a.url}})),
    );
    json!({"role": "user", "content": parts})
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response deserialization helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_chat_reply(provider: &str, body: &Value) -> Result<String> {
    let choice = body
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|a| a.first())
        .ok_or_else(|| Error::Provider {
            provider: provider.to_string(),
            message: "no choices in response".into(),
        })?;

    let message = choice.get("message").ok_or_else(|| Error::Provider {
        provider: provider.to_string(),
        message: "no message in choice".into(),
    })?;

    Ok(message
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string())
}

fn extract_sse_chunk(v: &Value) -> Extracted {
    if let Some(err) = v.get("error") {
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| err.to_string());
        return Extracted {
            error: Some(message),
            ..Default::default()
        };
    }

    // Usage-only and role-only chunks carry no content.
    let text = v
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|a| a.first())
        .and_then(|c| c.get("delta"))
        .and_then(|d| d.get("content"))
        .and_then(Value::as_str)
        .map(String::from);

    Extracted {
        text,
        ..Default::default()
    }
}

fn parse_model_list(body: &Value) -> Vec<String> {
    body.get("data")
        .and_then(Value::as_array)
        .map(|models| {
            models
                .iter()
                .filter_map(|m| m.get("id").and_then(Value::as_str).map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl ChatProvider for OpenAiCompatProvider {
    fn profile(&self) -> &ProviderProfile {
        &self.profile
    }

    async fn create_chat(&self, req: &ChatRequest, cfg: &ProviderConfig) -> Result<ChatOutput> {
        self.chat(req, cfg, req.opening(), new_chat_id()).await
    }

    async fn continue_chat(&self, req: &ChatRequest, cfg: &ProviderConfig) -> Result<ChatOutput> {
        let chat_id = req
            .continuation_id()
            .map(String::from)
            .unwrap_or_else(new_chat_id);
        self.chat(req, cfg, req.conversation(), chat_id).await
    }

    async fn list_models(&self, cfg: &ProviderConfig) -> Vec<String> {
        let reason = match self.fetch_models(cfg).await {
            Ok(models) if !models.is_empty() => return models,
            Ok(_) => "no models reported".to_string(),
            Err(e) => e.to_string(),
        };
        TraceEvent::ModelListFallback {
            provider: self.profile.id.clone(),
            reason,
        }
        .emit();
        self.profile.fallback_models.clone()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_has_flat_sampling_fields() {
        let cfg = ProviderConfig {
            temperature: Some(0.25),
            max_tokens: Some(100),
            ..Default::default()
        };
        let body = build_chat_body("gpt-4o-mini", &[ChatTurn::user("hi")], &[], &cfg, false);
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["temperature"], 0.25);
        assert_eq!(body["max_tokens"], 100);
        assert_eq!(body["stream"], false);
        assert!(body.get("options").is_none());
    }

    #[test]
    fn unset_sampling_fields_are_omitted() {
        let body = build_chat_body("m", &[], &[], &ProviderConfig::default(), true);
        assert!(body.get("temperature").is_none());
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn attachments_go_on_the_last_user_turn() {
        let turns = vec![
            ChatTurn::user("earlier"),
            ChatTurn::assistant("reply"),
            ChatTurn::user("what is this?"),
        ];
        let attachments = vec![Attachment {
            url: "https://example.com/a.png".into(),
        }];
        let body = build_chat_body("m", &turns, &attachments, &ProviderConfig::default(), false);
        assert_eq!(body["messages"][0]["content"], "earlier");
        let parts = body["messages"][2]["content"].as_array().unwrap();
        assert_eq!(parts[0], json!({"type": "text", "text": "what is this?"}));
        assert_eq!(parts[1]["image_url"]["url"], "https://example.com/a.png");
    }

    #[test]
    fn sse_chunk_content() {
        let v = json!({"choices": [{"delta": {"content": "Hi"}}]});
        assert_eq!(extract_sse_chunk(&v), Extracted::text("Hi"));
    }

    #[test]
    fn role_only_and_usage_chunks_have_no_text() {
        let role = json!({"choices": [{"delta": {"role": "assistant"}}]});
        assert_eq!(extract_sse_chunk(&role), Extracted::default());
        let usage = json!({"choices": [], "usage": {"total_tokens": 3}});
        assert_eq!(extract_sse_chunk(&usage), Extracted::default());
    }

    #[test]
    fn in_band_error_object() {
        let v = json!({"error": {"message": "rate limited", "type": "requests"}});
        assert_eq!(extract_sse_chunk(&v).error.as_deref(), Some("rate limited"));
    }

    #[test]
    fn sync_reply_parsing() {
        let body = json!({"choices": [{"message": {"role": "assistant", "content": "ok"}}]});
        assert_eq!(parse_chat_reply("openai", &body).unwrap(), "ok");
        let err = parse_chat_reply("openai", &json!({"choices": []})).unwrap_err();
        assert!(err.to_string().contains("no choices"));
    }

    #[test]
    fn model_list_parsing() {
        let body = json!({"object": "list", "data": [{"id": "gpt-4o"}, {"id": "gpt-4o-mini"}]});
        assert_eq!(parse_model_list(&body), vec!["gpt-4o", "gpt-4o-mini"]);
    }
}
