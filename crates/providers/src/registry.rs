//! Provider registry.
//!
//! An explicitly constructed map from provider id to adapter instance. The
//! HTTP boundary builds one at startup and passes it around; tests build
//! their own with substitute adapters.

use crate::ollama::OllamaProvider;
use crate::openai_compat::OpenAiCompatProvider;
use crate::passthrough::PassthroughProvider;
use crate::profile::ProviderInfo;
use crate::traits::ChatProvider;
use cm_domain::chat::ChatRequest;
use cm_domain::config::{HttpConfig, ProviderConfig};
use cm_domain::error::{Error, Result};
use cm_domain::stream::ChatOutput;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Model list of one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderModels {
    pub provider: String,
    pub models: Vec<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ProviderRegistry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Holds all adapter instances, in registration order.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn ChatProvider>>,
    order: Vec<String>,
}

impl ProviderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in provider: `ollama`, `ollama-cloud`,
    /// `openai`, `lmstudio`, `chat-service`.
    pub fn builtin(http: &HttpConfig) -> Result<Self> {
        let mut registry = Self::new();
        registry.register(Arc::new(OllamaProvider::local(http)?));
        registry.register(Arc::new(OllamaProvider::cloud(http)?));
        registry.register(Arc::new(OpenAiCompatProvider::openai(http)?));
        registry.register(Arc::new(OpenAiCompatProvider::lmstudio(http)?));
        registry.register(Arc::new(PassthroughProvider::chat_service(http)?));
        Ok(registry)
    }

    /// Add a provider. An existing provider with the same id is replaced in
    /// place.
    pub fn register(&mut self, provider: Arc<dyn ChatProvider>) {
        let id = provider.provider_id().to_string();
        if self.providers.insert(id.clone(), provider).is_none() {
            self.order.push(id.clone());
        }
        tracing::info!(provider_id = %id, "registered chat provider");
    }

    /// Look up a provider by id.
    pub fn get(&self, provider_id: &str) -> Result<Arc<dyn ChatProvider>> {
        self.providers
            .get(provider_id)
            .cloned()
            .ok_or_else(|| Error::ProviderNotFound(provider_id.to_string()))
    }

    /// Metadata for every provider, in registration order.
    pub fn catalog(&self) -> Vec<ProviderInfo> {
        self.order
            .iter()
            .filter_map(|id| self.providers.get(id))
            .map(|p| p.info())
            .collect()
    }

    /// Resolve a provider and fetch its model list.
    pub async fn list_models(&self, provider_id: &str, cfg: &ProviderConfig) -> Result<ProviderModels> {
        let provider = self.get(provider_id)?;
        let models = provider.list_models(cfg).await;
        Ok(ProviderModels {
            provider: provider_id.to_string(),
            models,
        })
    }

    /// Route a request: `continue_chat` when it carries a non-empty
    /// `chat_id`, `create_chat` otherwise.
    pub async fn send(
        &self,
        provider_id: &str,
        req: &ChatRequest,
        cfg: &ProviderConfig,
    ) -> Result<ChatOutput> {
        let provider = self.get(provider_id)?;
        if req.continuation_id().is_some() {
            provider.continue_chat(req, cfg).await
        } else {
            provider.create_chat(req, cfg).await
        }
    }

    /// Registered ids, in registration order.
    pub fn ids(&self) -> &[String] {
        &self.order
    }

    /// Number of registered providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
