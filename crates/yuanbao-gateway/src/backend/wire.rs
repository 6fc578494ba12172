//! Backend wire format decoding
//!
//! The chat endpoint answers with a line-oriented event stream:
//!
//! ```text
//! status
//! data: [TRACEID:8f1c...]
//! text
//! data: {"type":"think","content":"Let me"}
//! data: {"type":"think","content":" check."}
//! data: {"type":"text","msg":"Hello"}
//! data: [DONE]
//! ```
//!
//! Bare sentinel lines and bracketed control payloads carry no content and
//! are dropped before any JSON parsing happens.

use bytes::Bytes;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use serde_json::Value;
use std::time::Duration;

use crate::error::{GatewayError, Result};

/// Prefix of every data line
const EVENT_PREFIX: &str = "data: ";

/// Bare lines the backend interleaves between events
const BARE_SENTINELS: &[&str] = &["status", "text"];

/// Payload prefixes that are markers rather than JSON
const CONTROL_PREFIXES: &[&str] = &["[MSGINDEX:", "[TRACEID:", "[DONE]"];

/// Raw text lines of a backend response body
pub type LineStream = BoxStream<'static, Result<String>>;

/// Decoded events of a backend response, always terminated by [`VendorEvent::End`]
pub type VendorEventStream = BoxStream<'static, VendorEvent>;

/// A semantic event decoded from one backend line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VendorEvent {
    /// A fragment of the model's reasoning
    Reasoning(String),
    /// A fragment of the final answer
    Answer(String),
    /// The backend connection reached end of input
    End,
}

/// Decode a single backend line
///
/// Returns `Ok(None)` for lines that carry no content (sentinels, control
/// markers, empty lines, unknown payload types) and `Err(Parse)` for data
/// lines whose payload is not JSON.
pub fn decode_line(line: &str) -> Result<Option<VendorEvent>> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.is_empty() || BARE_SENTINELS.contains(&line) {
        return Ok(None);
    }

    let Some(payload) = line.strip_prefix(EVENT_PREFIX) else {
        return Ok(None);
    };
    if payload.is_empty() {
        return Ok(None);
    }
    if CONTROL_PREFIXES.iter().any(|p| payload.starts_with(p)) {
        tracing::debug!("Skipping control line: {payload}");
        return Ok(None);
    }

    let value: Value = serde_json::from_str(payload)
        .map_err(|e| GatewayError::Parse(format!("Invalid backend payload '{payload}': {e}")))?;

    let text_field = |field: &str| {
        value
            .get(field)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let event = match value.get("type").and_then(Value::as_str) {
        Some("think") => text_field("content").map(VendorEvent::Reasoning),
        Some("text") => text_field("msg").map(VendorEvent::Answer),
        _ => None,
    };
    Ok(event)
}

struct LineState<S> {
    body: S,
    buf: Vec<u8>,
    finished: bool,
}

/// Split a chunked response body into lines
///
/// Each read from `body` is bounded by `read_timeout`. A read failure or
/// timeout is yielded once as a `Backend` error; whatever partial line was
/// buffered is still flushed before the stream ends.
pub fn byte_lines<S, E>(body: S, read_timeout: Duration) -> LineStream
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = LineState {
        body: Box::pin(body),
        buf: Vec::new(),
        finished: false,
    };

    stream::unfold(state, move |mut state| async move {
        loop {
            if let Some(pos) = state.buf.iter().position(|b| *b == b'\n') {
                let raw: Vec<u8> = state.buf.drain(..=pos).collect();
                return Some((Ok(to_line(&raw[..pos])), state));
            }

            if state.finished {
                if state.buf.is_empty() {
                    return None;
                }
                let raw = std::mem::take(&mut state.buf);
                return Some((Ok(to_line(&raw)), state));
            }

            match tokio::time::timeout(read_timeout, state.body.next()).await {
                Ok(Some(Ok(bytes))) => state.buf.extend_from_slice(&bytes),
                Ok(Some(Err(e))) => {
                    state.finished = true;
                    let err = GatewayError::Backend(format!("Failed to read backend stream: {e}"));
                    return Some((Err(err), state));
                }
                Ok(None) => state.finished = true,
                Err(_) => {
                    state.finished = true;
                    let err = GatewayError::Backend(format!(
                        "Backend stream read timed out after {}s",
                        read_timeout.as_secs()
                    ));
                    return Some((Err(err), state));
                }
            }
        }
    })
    .boxed()
}

fn to_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_end_matches('\r')
        .to_string()
}

/// Decode a line stream into vendor events
///
/// Malformed payloads are logged and skipped. A transport error ends the
/// stream early; either way the last item is [`VendorEvent::End`].
pub fn vendor_events(lines: LineStream) -> VendorEventStream {
    stream::unfold(Some(lines), |state| async move {
        let mut lines = state?;
        loop {
            match lines.next().await {
                Some(Ok(line)) => {
                    tracing::trace!("Backend line: {line}");
                    match decode_line(&line) {
                        Ok(Some(event)) => return Some((event, Some(lines))),
                        Ok(None) => continue,
                        Err(e) => {
                            tracing::warn!(error_type = e.category(), "{e}");
                            continue;
                        }
                    }
                }
                Some(Err(e)) => {
                    tracing::error!(
                        error_type = e.category(),
                        error_message = %e,
                        "Backend stream interrupted, finishing response early"
                    );
                    return Some((VendorEvent::End, None));
                }
                None => return Some((VendorEvent::End, None)),
            }
        }
    })
    .boxed()
}
