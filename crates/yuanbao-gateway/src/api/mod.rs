//! Client-facing HTTP API
//!
//! Three dialects are served on one router:
//! - OpenAI chat completions ([`openai`])
//! - OpenAI-style responses ([`responses`])
//! - Ollama generate/chat plus the catalog endpoints ([`ollama`])

pub mod error;
mod extract;
mod ollama;
mod openai;
mod responses;
mod server;
mod sse;

pub use error::{ApiError, FieldError};
pub use extract::ApiJson;
pub use server::{AppState, GatewayServer, create_router};
pub use sse::ChunkEncoder;

use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;
use crate::stream::{self, AssembledAnswer};

/// A chat message as sent by OpenAI and Ollama clients
#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default)]
    pub tool_calls: Option<Value>,
}

impl ChatMessage {
    /// Plain text of the message content
    ///
    /// Multimodal arrays contribute their `text` parts joined by a space.
    pub fn content_text(&self) -> String {
        match &self.content {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(Value::Array(parts)) => parts
                .iter()
                .filter(|part| part.get("type").and_then(Value::as_str) == Some("text"))
                .map(|part| part.get("text").and_then(Value::as_str).unwrap_or_default())
                .collect::<Vec<_>>()
                .join(" "),
            Some(other) => other.to_string(),
        }
    }
}

/// Run `prompt` against `model` and collect the whole answer
pub(crate) async fn complete(state: &AppState, model: &str, prompt: &str) -> Result<AssembledAnswer> {
    let events = state.orchestrator.send(model, prompt).await?;
    Ok(stream::assemble(events).await)
}

/// Rendered answer text, or the error text when the request failed
pub(crate) fn reply_text(result: Result<AssembledAnswer>) -> String {
    match result {
        Ok(answer) => answer.render(),
        Err(e) => {
            tracing::error!(error_type = e.category(), error_message = %e, "Request failed");
            e.to_string()
        }
    }
}

/// Seconds since the epoch, for `created` fields
pub(crate) fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(content: Value) -> ChatMessage {
        ChatMessage {
            role: "user".to_string(),
            content: Some(content),
            tool_calls: None,
        }
    }

    #[test]
    fn test_content_text_string() {
        assert_eq!(message(Value::String("hi".into())).content_text(), "hi");
    }

    #[test]
    fn test_content_text_multimodal() {
        let content = serde_json::json!([
            {"type": "text", "text": "look at"},
            {"type": "image_url", "image_url": {"url": "http://x"}},
            {"type": "text", "text": "this"}
        ]);
        assert_eq!(message(content).content_text(), "look at this");
    }

    #[test]
    fn test_content_text_null_and_other() {
        assert_eq!(message(Value::Null).content_text(), "");
        assert_eq!(message(serde_json::json!(42)).content_text(), "42");
    }
}
