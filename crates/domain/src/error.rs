/// Shared error type used across all chatmux crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML: {0}")]
    Toml(String),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("provider not found: {0}")]
    ProviderNotFound(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the error was raised before any network call was attempted.
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_) | Error::ProviderNotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
