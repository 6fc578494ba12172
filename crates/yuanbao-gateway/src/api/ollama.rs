//! Ollama-compatible endpoints
//!
//! Every answer here is a 200 with text. Failures, including an unknown
//! model, are reported as the response text. `stream` is accepted but the
//! reply is always a single JSON object.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::{ApiJson, AppState, ChatMessage, complete, reply_text};
use crate::models;

const NO_USER_MESSAGE: &str = "No user message found";

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub options: Option<HashMap<String, Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OllamaChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub options: Option<HashMap<String, Value>>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub model: String,
    pub response: String,
    pub done: bool,
}

#[derive(Debug, Serialize)]
pub struct OllamaChatResponse {
    pub model: String,
    pub message: AssistantMessage,
    pub done: bool,
}

#[derive(Debug, Serialize)]
pub struct AssistantMessage {
    pub role: &'static str,
    pub content: String,
}

/// Prompt for `/api/chat`: the last user message, framed by the first system message
pub fn chat_prompt(messages: &[ChatMessage]) -> Option<String> {
    let user = messages
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .map(ChatMessage::content_text)
        .filter(|text| !text.is_empty())?;

    let system = messages
        .iter()
        .find(|m| m.role == "system")
        .map(ChatMessage::content_text)
        .filter(|text| !text.is_empty());

    Some(match system {
        Some(system) => format!("{system}\n\n用户问题：{user}"),
        None => user,
    })
}

/// `POST /api/generate`
pub async fn generate(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<GenerateRequest>,
) -> Json<GenerateResponse> {
    tracing::info!(
        "Generate request: model={}, stream={}, options={}",
        request.model,
        request.stream,
        request.options.as_ref().map_or(0, HashMap::len)
    );

    let response = reply_text(complete(&state, &request.model, &request.prompt).await);
    Json(GenerateResponse {
        model: request.model,
        response,
        done: true,
    })
}

/// `POST /api/chat`
pub async fn chat(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<OllamaChatRequest>,
) -> Json<OllamaChatResponse> {
    tracing::info!(
        "Ollama chat request: model={}, messages={}, stream={}, options={}",
        request.model,
        request.messages.len(),
        request.stream,
        request.options.as_ref().map_or(0, HashMap::len)
    );

    let content = match chat_prompt(&request.messages) {
        Some(prompt) => reply_text(complete(&state, &request.model, &prompt).await),
        None => NO_USER_MESSAGE.to_string(),
    };

    Json(OllamaChatResponse {
        model: request.model,
        message: AssistantMessage {
            role: "assistant",
            content,
        },
        done: true,
    })
}

/// `GET /api/tags`
pub async fn tags() -> Json<Value> {
    Json(serde_json::json!({ "models": models::catalog() }))
}

/// `GET /api/version`
pub async fn version() -> Json<Value> {
    Json(serde_json::json!({ "version": "1.0.0" }))
}
