//! Test utilities - a scripted backend and wire-line builders
//!
//! [`StubBackend`] stands in for the real backend in unit and integration
//! tests. It hands out fresh conversation ids, replays a fixed list of wire
//! lines for every chat, and can be told to fail in the ways the retry logic
//! cares about.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::backend::{BackendClient, LineStream};
use crate::error::{GatewayError, Result};

/// Wire line carrying a reasoning fragment
pub fn think_line(content: &str) -> String {
    format!(
        "data: {}",
        serde_json::json!({ "type": "think", "content": content })
    )
}

/// Wire line carrying an answer fragment
pub fn text_line(msg: &str) -> String {
    format!("data: {}", serde_json::json!({ "type": "text", "msg": msg }))
}

/// A full backend response: sentinels, trace marker, the given lines, `[DONE]`
pub fn wire_response(lines: &[String]) -> Vec<String> {
    let mut out = vec![
        "status".to_string(),
        "data: [TRACEID:0123456789abcdef]".to_string(),
        "text".to_string(),
    ];
    out.extend(lines.iter().cloned());
    out.push("data: [DONE]".to_string());
    out
}

#[derive(Debug, Default)]
enum SendFailure {
    #[default]
    Never,
    FirstN(usize, String),
    Always(String),
}

/// Scripted [`BackendClient`]
#[derive(Debug, Default)]
pub struct StubBackend {
    lines: Vec<String>,
    send_failure: SendFailure,
    session_failure: Option<String>,
    session_delay: Option<Duration>,
    sessions_created: AtomicUsize,
    send_attempts: AtomicUsize,
    conversations: Mutex<Vec<String>>,
    prompts: Mutex<Vec<String>>,
}

impl StubBackend {
    /// A backend that answers every chat with "ok"
    pub fn new() -> Self {
        Self {
            lines: wire_response(&[text_line("ok")]),
            ..Default::default()
        }
    }

    /// Replay `lines` verbatim for every chat
    pub fn with_lines(mut self, lines: Vec<String>) -> Self {
        self.lines = lines;
        self
    }

    /// Fail the first `n` chat sends with `message`
    pub fn failing_first_sends(mut self, n: usize, message: &str) -> Self {
        self.send_failure = SendFailure::FirstN(n, message.to_string());
        self
    }

    /// Fail every chat send with `message`
    pub fn always_failing(mut self, message: &str) -> Self {
        self.send_failure = SendFailure::Always(message.to_string());
        self
    }

    /// Fail every session creation with `message`
    pub fn failing_sessions(mut self, message: &str) -> Self {
        self.session_failure = Some(message.to_string());
        self
    }

    /// Sleep this long inside every session creation
    pub fn with_session_delay(mut self, delay: Duration) -> Self {
        self.session_delay = Some(delay);
        self
    }

    pub fn sessions_created(&self) -> usize {
        self.sessions_created.load(Ordering::SeqCst)
    }

    pub fn send_attempts(&self) -> usize {
        self.send_attempts.load(Ordering::SeqCst)
    }

    /// Conversation ids passed to `send_chat`, in call order
    pub fn conversations(&self) -> Vec<String> {
        self.conversations
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    /// Prompts passed to `send_chat`, in call order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl BackendClient for StubBackend {
    async fn create_session(&self, chat_model_id: &str) -> Result<String> {
        if let Some(delay) = self.session_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.session_failure {
            return Err(GatewayError::Backend(message.clone()));
        }
        let n = self.sessions_created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("stub-{chat_model_id}-{n}"))
    }

    async fn send_chat(
        &self,
        _chat_model_id: &str,
        conversation_id: &str,
        prompt: &str,
    ) -> Result<LineStream> {
        let attempt = self.send_attempts.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut c) = self.conversations.lock() {
            c.push(conversation_id.to_string());
        }
        if let Ok(mut p) = self.prompts.lock() {
            p.push(prompt.to_string());
        }

        match &self.send_failure {
            SendFailure::FirstN(n, message) if attempt < *n => {
                return Err(GatewayError::Backend(message.clone()));
            }
            SendFailure::Always(message) => return Err(GatewayError::Backend(message.clone())),
            _ => {}
        }

        let lines: Vec<Result<String>> = self.lines.iter().cloned().map(Ok).collect();
        Ok(stream::iter(lines).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stub_hands_out_distinct_sessions() {
        let stub = StubBackend::new();
        let a = stub.create_session("deep_seek").await.unwrap();
        let b = stub.create_session("deep_seek").await.unwrap();
        assert_ne!(a, b);
        assert_eq!(stub.sessions_created(), 2);
    }

    #[tokio::test]
    async fn stub_fails_first_sends_then_recovers() {
        let stub = StubBackend::new().failing_first_sends(1, "conversation not found");
        assert!(stub.send_chat("m", "c1", "hi").await.is_err());
        assert!(stub.send_chat("m", "c2", "hi").await.is_ok());
        assert_eq!(stub.send_attempts(), 2);
        assert_eq!(stub.conversations(), vec!["c1".to_string(), "c2".to_string()]);
    }

    #[test]
    fn wire_lines_are_json_events() {
        assert_eq!(think_line("嗯"), r#"data: {"content":"嗯","type":"think"}"#);
        assert_eq!(text_line("hi"), r#"data: {"msg":"hi","type":"text"}"#);
    }
}
