pub mod framing;
pub mod ollama;
pub mod openai_compat;
pub mod passthrough;
pub mod profile;
pub mod registry;
pub mod traits;
pub(crate) mod stream;
pub(crate) mod util;

// Re-exports for convenience.
pub use profile::{ProviderInfo, ProviderProfile};
pub use registry::{ProviderModels, ProviderRegistry};
pub use traits::ChatProvider;
