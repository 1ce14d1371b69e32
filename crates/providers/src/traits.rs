use crate::profile::{ProviderInfo, ProviderProfile};
use cm_domain::chat::ChatRequest;
use cm_domain::config::ProviderConfig;
use cm_domain::error::Result;
use cm_domain::stream::ChatOutput;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core provider trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Trait that every chat adapter must implement.
///
/// Implementations translate between the uniform request/response/event
/// shapes and one upstream wire protocol. They hold no per-call state: every
/// call builds its own decoder and accumulator, so one instance can serve
/// concurrent calls.
///
/// When `req.streaming` is set, create/continue return
/// [`ChatOutput::Stream`]; otherwise [`ChatOutput::Complete`]. Configuration
/// errors are returned before any network call in both modes. Once a stream
/// is returned, upstream failures arrive as its terminal `Error` event.
#[async_trait::async_trait]
pub trait ChatProvider: Send + Sync {
    /// Static profile of this provider instance.
    fn profile(&self) -> &ProviderProfile;

    /// Start a new upstream conversation from `req.message`.
    async fn create_chat(&self, req: &ChatRequest, cfg: &ProviderConfig) -> Result<ChatOutput>;

    /// Continue a conversation: `req.prior_turns` followed by `req.message`.
    async fn continue_chat(&self, req: &ChatRequest, cfg: &ProviderConfig) -> Result<ChatOutput>;

    /// Model ids offered by the upstream. Never fails: on any error the
    /// profile's fallback list is returned.
    async fn list_models(&self, cfg: &ProviderConfig) -> Vec<String>;

    /// A unique identifier for this provider instance.
    fn provider_id(&self) -> &str {
        &self.profile().id
    }

    /// Catalog entry for this provider.
    fn info(&self) -> ProviderInfo {
        self.profile().info()
    }
}
