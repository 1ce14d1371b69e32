use serde::{Deserialize, Serialize};
use std::time::Duration;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Upstream transport
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Timeouts for upstream HTTP calls. There is no retry setting: a failed
/// upstream call is terminal for that call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "d_10000")]
    pub connect_timeout_ms: u64,
    /// Whole-request deadline for synchronous calls and model listing.
    /// Streams are not bounded by it.
    #[serde(default = "d_120000")]
    pub request_timeout_ms: u64,
}

impl HttpConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            request_timeout_ms: 120_000,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_10000() -> u64 {
    10_000
}
fn d_120000() -> u64 {
    120_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_table_uses_defaults() {
        let cfg: HttpConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.connect_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.request_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn partial_override() {
        let cfg: HttpConfig = toml::from_str("request_timeout_ms = 500").unwrap();
        assert_eq!(cfg.request_timeout_ms, 500);
        assert_eq!(cfg.connect_timeout_ms, 10_000);
    }
}
