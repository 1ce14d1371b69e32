//! Line framing for upstream response bodies.
//!
//! Upstreams deliver bytes at arbitrary boundaries, including in the middle
//! of a multi-byte UTF-8 character. [`LineDecoder`] holds incomplete bytes and
//! incomplete lines across calls; [`FrameDecoder`] applies one of the two
//! framing conventions on top:
//!
//! - [`Framing::JsonLines`] -- every non-empty line is a JSON object
//! - [`Framing::Sse`] -- `data: <json>` lines, terminated by `data: [DONE]`
//!
//! A line that fails to parse is logged and dropped; decoding continues.

use serde_json::Value;

/// Longest prefix of a malformed line that gets logged.
const LOG_SNIPPET_CHARS: usize = 200;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LineDecoder
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Incremental bytes-to-lines decoder.
#[derive(Debug, Default)]
pub struct LineDecoder {
    /// Trailing bytes of an incomplete UTF-8 sequence.
    pending: Vec<u8>,
    /// Decoded text not yet terminated by `\n`.
    buffer: String,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return every line it completed, without the line
    /// terminator (`\n` or `\r\n`).
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        self.decode_pending();

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let mut line: String = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
            lines.push(line);
        }
        lines
    }

    /// Flush whatever is left once the body has ended.
    pub fn finish(&mut self) -> Option<String> {
        if !self.pending.is_empty() {
            self.buffer.push_str(&String::from_utf8_lossy(&self.pending));
            self.pending.clear();
        }
        let rest = std::mem::take(&mut self.buffer);
        let rest = rest.strip_suffix('\r').unwrap_or(&rest);
        if rest.is_empty() {
            None
        } else {
            Some(rest.to_string())
        }
    }

    /// Move every complete character from `pending` into `buffer`. Invalid
    /// sequences become U+FFFD; an incomplete tail stays pending.
    fn decode_pending(&mut self) {
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    self.pending.clear();
                    return;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    if let Ok(text) = std::str::from_utf8(&self.pending[..valid]) {
                        self.buffer.push_str(text);
                    }
                    match e.error_len() {
                        None => {
                            self.pending.drain(..valid);
                            return;
                        }
                        Some(bad) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + bad);
                        }
                    }
                }
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// FrameDecoder
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Newline-delimited JSON.
    JsonLines,
    /// Server-sent events with JSON `data:` payloads.
    Sse,
}

/// One logical upstream event.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Json(Value),
    /// The SSE `[DONE]` sentinel.
    Done,
}

/// Per-stream decoder: bytes in, frames out.
#[derive(Debug)]
pub struct FrameDecoder {
    framing: Framing,
    lines: LineDecoder,
    skipped: usize,
}

impl FrameDecoder {
    pub fn new(framing: Framing) -> Self {
        Self {
            framing,
            lines: LineDecoder::new(),
            skipped: 0,
        }
    }

    pub fn decode(&mut self, chunk: &[u8]) -> Vec<Frame> {
        let lines = self.lines.push(chunk);
        lines.iter().filter_map(|l| self.parse_line(l)).collect()
    }

    /// Decode the unterminated last line, if any.
    pub fn finish(&mut self) -> Vec<Frame> {
        match self.lines.finish() {
            Some(line) => self.parse_line(&line).into_iter().collect(),
            None => Vec::new(),
        }
    }

    /// Number of malformed lines dropped so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn parse_line(&mut self, line: &str) -> Option<Frame> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let payload = match self.framing {
            Framing::JsonLines => line,
            Framing::Sse => {
                // `event:`, `id:`, `retry:` and `:` comment lines carry nothing we use.
                let data = line.strip_prefix("data:")?.trim();
                if data == "[DONE]" {
                    return Some(Frame::Done);
                }
                if data.is_empty() {
                    return None;
                }
                data
            }
        };

        match serde_json::from_str::<Value>(payload) {
            Ok(value) => Some(Frame::Json(value)),
            Err(e) => {
                self.skipped += 1;
                tracing::warn!(
                    framing = ?self.framing,
                    error = %e,
                    line = %snippet(payload),
                    "skipping malformed upstream line"
                );
                None
            }
        }
    }
}

pub(crate) fn snippet(s: &str) -> String {
    if s.chars().count() <= LOG_SNIPPET_CHARS {
        return s.to_string();
    }
    let mut out: String = s.chars().take(LOG_SNIPPET_CHARS).collect();
    out.push('…');
    out
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
