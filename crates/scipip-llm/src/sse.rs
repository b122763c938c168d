//! SSE (Server-Sent Events) parsing for incremental chat completions.
//!
//! The endpoint sends lines like:
//!
//! ```text
//! data: {"id":"...","choices":[{"delta":{"content":"Hello"}}]}
//!
//! data: {"id":"...","choices":[{"delta":{"content":" world"}}]}
//!
//! data: [DONE]
//! ```
//!
//! [`parse_sse_line`] classifies one line; [`SseAccumulator`] splits raw
//! byte chunks into lines (chunks may end mid-line) and concatenates the
//! `content` of every delta until `[DONE]`.

use tracing::warn;

use crate::error::{ProviderError, Result};
use crate::types::StreamDelta;

/// The sentinel value that marks the end of an SSE stream.
const DONE_SENTINEL: &str = "[DONE]";

/// What a single SSE line means for the accumulated text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine {
    /// Blank lines, comments, non-`data:` fields, or deltas without text.
    Skip,
    /// A text fragment to append.
    Delta(String),
    /// The `[DONE]` sentinel.
    Done,
}

/// Parse a single SSE line.
///
/// # Errors
///
/// Returns [`ProviderError::InvalidResponse`] if a `data:` line carries JSON
/// that cannot be parsed as a streaming chunk.
pub fn parse_sse_line(line: &str) -> Result<SseLine> {
    let line = line.trim_end();

    if line.is_empty() || line.starts_with(':') {
        return Ok(SseLine::Skip);
    }

    let Some(rest) = line.strip_prefix("data:") else {
        // event:, id:, retry: lines
        return Ok(SseLine::Skip);
    };
    let payload = rest.trim_start();

    if payload.is_empty() {
        return Ok(SseLine::Skip);
    }
    if payload == DONE_SENTINEL {
        return Ok(SseLine::Done);
    }

    let delta: StreamDelta = serde_json::from_str(payload)
        .map_err(|e| ProviderError::InvalidResponse(format!("failed to parse SSE delta: {e}")))?;

    match delta
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
    {
        Some(text) if !text.is_empty() => Ok(SseLine::Delta(text)),
        _ => Ok(SseLine::Skip),
    }
}

/// Incrementally accumulates delta text from a raw SSE byte stream.
#[derive(Debug, Default)]
pub struct SseAccumulator {
    pending: Vec<u8>,
    text: String,
    done: bool,
}

impl SseAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes. Returns the deltas completed by this chunk.
    ///
    /// Bytes after `[DONE]` are ignored. Malformed lines are skipped.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        if self.done {
            return Vec::new();
        }
        self.pending.extend_from_slice(bytes);

        let mut deltas = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            if let Some(delta) = self.consume_line(&line) {
                deltas.push(delta);
            }
            if self.done {
                self.pending.clear();
                break;
            }
        }
        deltas
    }

    /// Flush the trailing partial line (streams may end without `\n`).
    pub fn finish(&mut self) -> Option<String> {
        if self.done || self.pending.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.pending);
        self.consume_line(&line)
    }

    /// Whether the `[DONE]` sentinel has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// The text accumulated so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    fn consume_line(&mut self, raw: &[u8]) -> Option<String> {
        let Ok(line) = std::str::from_utf8(raw) else {
            warn!("non-UTF-8 SSE line, skipping");
            return None;
        };
        match parse_sse_line(line) {
            Ok(SseLine::Delta(text)) => {
                self.text.push_str(&text);
                Some(text)
            }
            Ok(SseLine::Done) => {
                self.done = true;
                None
            }
            Ok(SseLine::Skip) => None,
            Err(e) => {
                warn!(error = %e, "SSE parse error, skipping line");
                None
            }
        }
    }
}
