//! Provider profiles.
//!
//! A profile is the small value object that distinguishes two instances of
//! the same adapter family: default endpoint, default model, whether a
//! credential is mandatory, and the model list used when discovery fails.
//! Local and cloud Ollama share one adapter and differ only here.

use serde::Serialize;

/// Static description of one registered provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub id: String,
    pub display_name: String,
    pub description: String,
    pub default_base_url: String,
    pub default_model: String,
    pub requires_api_key: bool,
    pub fallback_models: Vec<String>,
}

/// Catalog entry exposed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub requires_api_key: bool,
    pub default_base_url: String,
}

impl ProviderProfile {
    pub fn info(&self) -> ProviderInfo {
        ProviderInfo {
            id: self.id.clone(),
            name: self.display_name.clone(),
            description: self.description.clone(),
            requires_api_key: self.requires_api_key,
            default_base_url: self.default_base_url.clone(),
        }
    }

    /// Ollama running on this machine.
    pub fn ollama() -> Self {
        Self {
            id: "ollama".into(),
            display_name: "Ollama".into(),
            description: "Local models served by an Ollama daemon".into(),
            default_base_url: "http://localhost:11434".into(),
            default_model: "llama3.2".into(),
            requires_api_key: false,
            fallback_models: strings(&["llama3.2", "mistral", "qwen2.5"]),
        }
    }

    /// Hosted Ollama. Same wire protocol, mandatory credential.
    pub fn ollama_cloud() -> Self {
        Self {
            id: "ollama-cloud".into(),
            display_name: "Ollama Cloud".into(),
            description: "Ollama-hosted models, API key required".into(),
            default_base_url: "https://ollama.com".into(),
            default_model: "gpt-oss:120b".into(),
            requires_api_key: true,
            fallback_models: strings(&["gpt-oss:120b", "gpt-oss:20b", "deepseek-v3.1:671b"]),
        }
    }

    pub fn openai() -> Self {
        Self {
            id: "openai".into(),
            display_name: "OpenAI".into(),
            description: "OpenAI chat completions API".into(),
            default_base_url: "https://api.openai.com".into(),
            default_model: "gpt-4o-mini".into(),
            requires_api_key: true,
            fallback_models: strings(&["gpt-4o-mini", "gpt-4o", "gpt-4.1-mini"]),
        }
    }

    /// LM Studio's local OpenAI-compatible server.
    pub fn lmstudio() -> Self {
        Self {
            id: "lmstudio".into(),
            display_name: "LM Studio".into(),
            description: "Local models served by LM Studio".into(),
            default_base_url: "http://localhost:1234".into(),
            default_model: "local-model".into(),
            requires_api_key: false,
            fallback_models: strings(&["local-model"]),
        }
    }

    /// A chat service that already speaks the chatmux response and
    /// event-stream shapes.
    pub fn chat_service() -> Self {
        Self {
            id: "chat-service".into(),
            display_name: "Chat Service".into(),
            description: "Upstream chat service with native chatmux streaming".into(),
            default_base_url: "http://localhost:8787".into(),
            default_model: String::new(),
            requires_api_key: false,
            fallback_models: strings(&["default"]),
        }
    }

    /// Same profile under a different id, for running two instances of one
    /// family side by side.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
