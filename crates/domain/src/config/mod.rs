mod http;
mod provider;

pub use http::*;
pub use provider::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// File-level configuration: transport settings plus per-provider defaults.
///
/// ```toml
/// [http]
/// connect_timeout_ms = 5000
///
/// [providers.openai]
/// apiKeyEnv = "OPENAI_API_KEY"
/// modelName = "gpt-4o"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChatmuxConfig {
    #[serde(default)]
    pub http: HttpConfig,
    /// Provider configs keyed by provider id.
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

impl ChatmuxConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| Error::Toml(e.to_string()))
    }

    /// Read and parse a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&raw)?;
        tracing::debug!(
            path = %path.display(),
            providers = config.providers.len(),
            "loaded chatmux config"
        );
        Ok(config)
    }

    /// The configured [`ProviderConfig`] for `provider_id`, or an empty one.
    pub fn provider(&self, provider_id: &str) -> ProviderConfig {
        self.providers.get(provider_id).cloned().unwrap_or_default()
    }
}
