//! Shared utility functions for provider adapters.

use crate::profile::ProviderProfile;
use cm_domain::config::{HttpConfig, ProviderConfig};
use cm_domain::error::{Error, Result};

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
///
/// Timeout errors map to [`Error::Timeout`]; everything else maps to
/// [`Error::Http`].
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Error for a non-success upstream status, keeping the status and body.
pub(crate) fn status_error(provider: &str, status: reqwest::StatusCode, body: &str) -> Error {
    Error::Provider {
        provider: provider.to_string(),
        message: format!("HTTP {} - {}", status.as_u16(), body),
    }
}

/// Build the HTTP client shared by every call of one adapter.
///
/// Only the connect timeout is set here; a whole-request timeout would also
/// cut off long streams, so synchronous calls set theirs per request.
pub(crate) fn build_client(http: &HttpConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(http.connect_timeout())
        .build()
        .map_err(from_reqwest)
}

/// Resolve the bearer credential for a call.
///
/// Fails before any network activity when the profile mandates a key and
/// none is configured.
pub(crate) fn resolve_credential(
    profile: &ProviderProfile,
    cfg: &ProviderConfig,
) -> Result<Option<String>> {
    let key = cfg.resolved_api_key();
    if key.is_none() && profile.requires_api_key {
        return Err(Error::Config(format!(
            "provider '{}' requires an apiKey",
            profile.id
        )));
    }
    Ok(key)
}

/// Attach `Authorization: Bearer <key>` when a key is present.
pub(crate) fn with_bearer(rb: reqwest::RequestBuilder, key: Option<&str>) -> reqwest::RequestBuilder {
    match key {
        Some(key) => rb.bearer_auth(key),
        None => rb,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_for_mandatory_profile_is_config_error() {
        let err = resolve_credential(&ProviderProfile::openai(), &ProviderConfig::default())
            .unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("openai"));
    }

    #[test]
    fn optional_profile_accepts_no_key() {
        let key = resolve_credential(&ProviderProfile::ollama(), &ProviderConfig::default())
            .unwrap();
        assert!(key.is_none());
    }

    #[test]
    fn key_is_returned_when_present() {
        let cfg = ProviderConfig::default().with_api_key("sk-test");
        let key = resolve_credential(&ProviderProfile::ollama_cloud(), &cfg).unwrap();
        assert_eq!(key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn status_error_keeps_code_and_body() {
        let err = status_error("lmstudio", reqwest::StatusCode::BAD_GATEWAY, "no model loaded");
        assert_eq!(err.to_string(), "provider lmstudio: HTTP 502 - no model loaded");
    }
}
