//! Ollama adapter (newline-delimited JSON streaming).
//!
//! Serves both the local daemon and the hosted service; the two differ only
//! in their [`ProviderProfile`].
//!
//! Wire contract:
//! - `POST {base}/api/chat` with `{model, messages, stream, options}`
//! - streaming body: one `{model, message:{role, content}, done}` per line
//! - `GET {base}/api/tags` for model discovery

use crate::framing::Framing;
use crate::profile::ProviderProfile;
use crate::stream::{document_stream, Extracted, StreamCall};
use crate::traits::ChatProvider;
use crate::util::{build_client, from_reqwest, resolve_credential, status_error, with_bearer};
use cm_domain::chat::{new_chat_id, ChatRequest, ChatResponse, ChatTurn};
use cm_domain::config::{HttpConfig, ProviderConfig};
use cm_domain::error::{Error, Result};
use cm_domain::stream::ChatOutput;
use cm_domain::trace::TraceEvent;
use serde_json::{json, Map, Value};
use std::time::{Duration, Instant};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct OllamaProvider {
    profile: ProviderProfile,
    client: reqwest::Client,
    request_timeout: Duration,
}

impl OllamaProvider {
    pub fn new(profile: ProviderProfile, http: &HttpConfig) -> Result<Self> {
        Ok(Self {
            profile,
            client: build_client(http)?,
            request_timeout: http.request_timeout(),
        })
    }

    /// The local daemon on `localhost:11434`.
    pub fn local(http: &HttpConfig) -> Result<Self> {
        Self::new(ProviderProfile::ollama(), http)
    }

    /// The hosted service; calls fail fast without an API key.
    pub fn cloud(http: &HttpConfig) -> Result<Self> {
        Self::new(ProviderProfile::ollama_cloud(), http)
    }

    async fn chat(
        &self,
        req: &ChatRequest,
        cfg: &ProviderConfig,
        turns: Vec<ChatTurn>,
        chat_id: String,
    ) -> Result<ChatOutput> {
        let api_key = resolve_credential(&self.profile, cfg)?;
        let url = format!("{}/api/chat", cfg.base_url_or(&self.profile.default_base_url));
        let model = cfg.model_or(&self.profile.default_model);

        if !req.attachments.is_empty() {
            tracing::debug!(
                provider = %self.profile.id,
                count = req.attachments.len(),
                "ollama does not accept URL attachments, ignoring them"
            );
        }

        let body = build_chat_body(&model, &turns, cfg, req.streaming);

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
                request: rb,
                framing: Framing::JsonLines,
            };
            return Ok(ChatOutput::Stream(document_stream(call, extract_stream_chunk)));
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
        let url = format!("{}/api/tags", cfg.base_url_or(&self.profile.default_base_url));
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
        Ok(parse_model_tags(&resp_json))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wire helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn build_chat_body(model: &str, turns: &[ChatTurn], cfg: &ProviderConfig, stream: bool) -> Value {
    let messages: Vec<Value> = turns
        .iter()
        .map(|t| json!({"role": t.role.as_str(), "content": t.content}))
        .collect();

    let mut options = Map::new();
    if let Some(temp) = cfg.temperature {
        options.insert("temperature".into(), json!(temp));
    }
    if let Some(max) = cfg.max_tokens {
        options.insert("num_predict".into(), json!(max));
    }

    json!({
        "model": model,
        "messages": messages,
        "stream": stream,
        "options": options,
    })
}

fn parse_chat_reply(provider: &str, body: &Value) -> Result<String> {
    let message = body.get("message").ok_or_else(|| Error::Provider {
        provider: provider.to_string(),
        message: "no message in response".into(),
    })?;
    Ok(message
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string())
}

fn extract_stream_chunk(v: &Value) -> Extracted {
    if let Some(err) = v.get("error") {
        return Extracted {
            error: Some(err.as_str().map(String::from).unwrap_or_else(|| err.to_string())),
            ..Default::default()
        };
    }
    Extracted {
        text: v
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
            .map(String::from),
        finished: v.get("done").and_then(Value::as_bool).unwrap_or(false),
        error: None,
    }
}

fn parse_model_tags(body: &Value) -> Vec<String> {
    body.get("models")
        .and_then(Value::as_array)
        .map(|models| {
            models
                .iter()
                .filter_map(|m| {
                    m.get("name")
                        .or_else(|| m.get("model"))
                        .and_then(Value::as_str)
                        .map(String::from)
                })
                .collect()
        })
        .unwrap_or_default()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl ChatProvider for OllamaProvider {
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
