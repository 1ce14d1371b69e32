use serde::Serialize;

/// Structured trace events emitted across all chatmux crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    UpstreamRequest {
        provider: String,
        model: String,
        url: String,
        streaming: bool,
        continuation: bool,
    },
    UpstreamResponse {
        provider: String,
        status: u16,
        duration_ms: u64,
    },
    StreamFinished {
        provider: String,
        chat_id: String,
        deltas: usize,
        chars: usize,
        outcome: StreamOutcome,
    },
    ModelListFallback {
        provider: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamOutcome {
    Done,
    Error,
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "cm_event");
    }
}
