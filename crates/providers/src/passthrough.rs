//! Pass-through adapter for an upstream chat service that already speaks
//! the chatmux shapes.
//!
//! Wire contract:
//! - `POST {base}/v1/chats` to create,
//!   `POST {base}/v1/chats/{chatId}/messages` to continue
//! - body `{message, priorTurns?, attachments?, streaming, model?}`
//! - synchronous reply: a ChatResponse whose messages carry their document
//!   under `experimental_content`
//! - streaming reply: `data: <event>` frames ending with `data: [DONE]`
//! - `GET {base}/v1/models` returning `{data:[{id}]}`

use crate::profile::ProviderProfile;
use crate::stream::forward_stream;
use crate::traits::ChatProvider;
use crate::util::{build_client, from_reqwest, resolve_credential, status_error, with_bearer};
use cm_domain::chat::{new_chat_id, ChatRequest, ChatResponse, ResponseMessage, Role};
use cm_domain::config::{HttpConfig, ProviderConfig};
use cm_domain::document::Document;
use cm_domain::error::{Error, Result};
use cm_domain::stream::ChatOutput;
use cm_domain::trace::TraceEvent;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

pub struct PassthroughProvider {
    profile: ProviderProfile,
    client: reqwest::Client,
    request_timeout: Duration,
}

impl PassthroughProvider {
    pub fn new(profile: ProviderProfile, http: &HttpConfig) -> Result<Self> {
        Ok(Self {
            profile,
            client: build_client(http)?,
            request_timeout: http.request_timeout(),
        })
    }

    pub fn chat_service(http: &HttpConfig) -> Result<Self> {
        Self::new(ProviderProfile::chat_service(), http)
    }

    async fn forward(
        &self,
        req: &ChatRequest,
        cfg: &ProviderConfig,
        url: String,
        body: Value,
        fallback_id: String,
    ) -> Result<ChatOutput> {
        let api_key = resolve_credential(&self.profile, cfg)?;

        TraceEvent::UpstreamRequest {
            provider: self.profile.id.clone(),
            model: cfg.model_name.clone().unwrap_or_default(),
            url: url.clone(),
            streaming: req.streaming,
            continuation: req.continuation_id().is_some(),
        }
        .emit();

        let rb = with_bearer(self.client.post(&url).json(&body), api_key.as_deref());

        if req.streaming {
            let rb = rb.header("Accept", "text/event-stream");
            return Ok(ChatOutput::Stream(forward_stream(
                self.profile.id.clone(),
                fallback_id,
                rb,
            )));
        }

        let resp = rb
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        let resp_text = resp.text().await.map_err(from_reqwest)?;
        if !status.is_success() {
            return Err(status_error(&self.profile.id, status, &resp_text));
        }

        let upstream: UpstreamResponse = serde_json::from_str(&resp_text)?;
        reshape(&self.profile.id, upstream).map(ChatOutput::Complete)
    }

    async fn fetch_models(&self, cfg: &ProviderConfig) -> Result<Vec<String>> {
        let url = format!("{}/v1/models", cfg.base_url_or(&self.profile.default_base_url));
        let resp = with_bearer(self.client.get(&url), cfg.resolved_api_key().as_deref())
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
        Ok(resp_json
            .get("data")
            .and_then(Value::as_array)
            .map(|models| {
                models
                    .iter()
                    .filter_map(|m| m.get("id").and_then(Value::as_str).map(String::from))
                    .collect()
            })
            .unwrap_or_default())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Upstream response shape
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
struct UpstreamResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    messages: Option<Vec<UpstreamMessage>>,
}

#[derive(Debug, Deserialize)]
struct UpstreamMessage {
    id: String,
    role: Role,
    #[serde(default)]
    content: String,
    #[serde(default, alias = "structuredContent")]
    experimental_content: Option<Document>,
}

/// Move each message's `experimental_content` to `structured_content`.
fn reshape(provider: &str, upstream: UpstreamResponse) -> Result<ChatResponse> {
    if upstream.id.is_empty() {
        return Err(Error::Provider {
            provider: provider.to_string(),
            message: "response has no chat id".into(),
        });
    }
    let messages = upstream.messages.map(|messages| {
        messages
            .into_iter()
            .map(|m| ResponseMessage {
                id: m.id,
                role: m.role,
                content: m.content,
                structured_content: m.experimental_content,
            })
            .collect()
    });
    Ok(ChatResponse {
        id: upstream.id,
        messages,
    })
}

fn build_body(req: &ChatRequest, cfg: &ProviderConfig, continuation: bool) -> Value {
    let mut body = json!({
        "message": req.message,
        "streaming": req.streaming,
    });
    if continuation && !req.prior_turns.is_empty() {
        body["priorTurns"] = json!(req.prior_turns);
    }
    if !req.attachments.is_empty() {
        body["attachments"] = json!(req.attachments);
    }
    if let Some(model) = cfg.model_name.as_deref().filter(|m| !m.is_empty()) {
        body["model"] = json!(model);
    }
    body
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl ChatProvider for PassthroughProvider {
    fn profile(&self) -> &ProviderProfile {
        &self.profile
    }

    async fn create_chat(&self, req: &ChatRequest, cfg: &ProviderConfig) -> Result<ChatOutput> {
        let url = format!("{}/v1/chats", cfg.base_url_or(&self.profile.default_base_url));
        let body = build_body(req, cfg, false);
        self.forward(req, cfg, url, body, new_chat_id()).await
    }

    async fn continue_chat(&self, req: &ChatRequest, cfg: &ProviderConfig) -> Result<ChatOutput> {
        let chat_id = req.continuation_id().ok_or_else(|| {
            Error::Config(format!(
                "provider '{}' needs a chatId to continue a conversation",
                self.profile.id
            ))
        })?;
        let url = format!(
            "{}/v1/chats/{}/messages",
            cfg.base_url_or(&self.profile.default_base_url),
            chat_id
        );
        let body = build_body(req, cfg, true);
        self.forward(req, cfg, url, body, chat_id.to_string()).await
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
