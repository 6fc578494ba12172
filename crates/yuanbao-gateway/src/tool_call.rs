//! Embedded tool-call recognition
//!
//! The backend has no native function calling. Clients that want tools
//! instruct the model to answer with a JSON object such as
//!
//! ```json
//! {"type": "tool_call", "tool": "exec", "command": "ls", "args": ["-la"], "comment": "list files"}
//! ```
//!
//! possibly wrapped in a fenced code block or surrounded by prose. This module
//! digs that object out of a finished answer. It never fails: anything that
//! does not parse is simply not a tool call.

use serde::Serialize;
use serde_json::{Map, Value};

/// Discriminator value marking a tool call
const TOOL_CALL_TYPE: &str = "tool_call";

/// A structured tool invocation requested by the model
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ToolCallEnvelope {
    pub tool: String,
    pub command: String,
    pub comment: String,
    pub args: Vec<String>,
}

impl ToolCallEnvelope {
    fn from_object(object: &Map<String, Value>) -> Option<Self> {
        if object.get("type").and_then(Value::as_str) != Some(TOOL_CALL_TYPE) {
            return None;
        }

        let text = |key: &str| {
            object
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let args = match object.get("args") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            _ => Vec::new(),
        };

        Some(Self {
            tool: text("tool"),
            command: text("command"),
            comment: text("comment"),
            args,
        })
    }
}

/// Find a tool call embedded in `text`
///
/// Returns `None` when the conversation already contains a tool result, so a
/// model summarising that result is never mistaken for a new call.
pub fn extract(text: &str, history_has_tool_result: bool) -> Option<ToolCallEnvelope> {
    if history_has_tool_result {
        return None;
    }

    let working = strip_fence(text).unwrap_or(text);

    let from_span = object_spans(working).find_map(|span| {
        serde_json::from_str::<Value>(span)
            .ok()
            .and_then(|value| value.as_object().and_then(ToolCallEnvelope::from_object))
    });
    if from_span.is_some() {
        return from_span;
    }

    serde_json::from_str::<Value>(working.trim())
        .ok()
        .and_then(|value| value.as_object().and_then(ToolCallEnvelope::from_object))
}

/// Inner text of the first closed fenced block, without its language tag
fn strip_fence(text: &str) -> Option<&str> {
    const FENCE: &str = "```";
    let start = text.find(FENCE)? + FENCE.len();
    let rest = &text[start..];
    let end = rest.find(FENCE)?;
    let inner = &rest[..end];

    // A first line with no JSON on it is a language tag
    match inner.split_once('\n') {
        Some((first, body)) if !first.trim().starts_with('{') => Some(body),
        _ => Some(inner),
    }
}

/// Balanced `{...}` spans of `text`, in order of their opening brace
///
/// One pass over the text with a stack of open braces. String contents are
/// skipped only while inside an object, so quotes in surrounding prose do
/// not hide the JSON that follows.
fn object_spans(text: &str) -> impl Iterator<Item = &str> {
    let mut open: Vec<usize> = Vec::new();
    let mut spans: Vec<(usize, usize)> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (index, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' if !open.is_empty() => in_string = true,
            '{' => open.push(index),
            '}' => {
                if let Some(start) = open.pop() {
                    spans.push((start, index));
                }
            }
            _ => {}
        }
    }

    spans.sort_unstable_by_key(|(start, _)| *start);
    spans.into_iter().map(move |(start, end)| &text[start..=end])
}
