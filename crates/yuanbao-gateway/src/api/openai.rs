//! `POST /v1/chat/completions`
//!
//! The whole conversation is linearized into one prompt, since the backend
//! keeps its own context and only accepts a single message per send. The
//! finished answer is checked for an embedded tool call, which is then
//! reported in OpenAI `tool_calls` form instead of as text.

use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use futures::stream;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::sse::{ChunkEncoder, FunctionCall, sse_response};
use super::{ApiError, ApiJson, AppState, ChatMessage, complete, reply_text, unix_now};
use crate::models::{self, DEFAULT_MODEL};
use crate::stream::{FinishReason, StreamChunk, StreamTranscoder, delta_text, transcode};
use crate::tool_call;

/// Appended to the transcript once a tool has run
const TOOL_RESULT_INSTRUCTION: &str = "\n[System指令: 上面是工具执行的结果。请根据执行结果给用户一个友好的总结回复，不要再次执行相同的命令。]";

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default = "default_model")]
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub stream: bool,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    2000
}

/// A conversation flattened into a single prompt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    pub prompt: String,
    pub has_user: bool,
    pub has_tool_call: bool,
    pub has_tool_result: bool,
}

impl Transcript {
    /// One `Role: text` line per non-empty message, in order
    pub fn build(messages: &[ChatMessage]) -> Self {
        let mut transcript = Transcript::default();
        let mut lines = Vec::with_capacity(messages.len() + 1);

        for message in messages {
            let text = message.content_text();
            if message.role == "assistant"
                && (message.tool_calls.is_some() || text.contains("\"tool_calls\""))
            {
                transcript.has_tool_call = true;
            }
            if text.is_empty() {
                continue;
            }
            let prefix = match message.role.as_str() {
                "system" => "System",
                "user" => {
                    transcript.has_user = true;
                    "User"
                }
                "assistant" => "Assistant",
                "tool" => {
                    transcript.has_tool_result = true;
                    "Tool执行结果"
                }
                other => {
                    tracing::debug!("Skipping message with role '{other}'");
                    continue;
                }
            };
            lines.push(format!("{prefix}: {text}"));
        }

        if transcript.has_tool_result {
            lines.push(TOOL_RESULT_INSTRUCTION.to_string());
        }
        transcript.prompt = lines.join("\n");
        transcript
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

impl Usage {
    /// Character counts stand in for tokens
    pub(crate) fn from_text(prompt: &str, completion: &str) -> Self {
        let prompt_tokens = prompt.chars().count();
        let completion_tokens = completion.chars().count();
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

#[derive(Debug, Serialize)]
struct Completion {
    id: String,
    object: &'static str,
    created: i64,
    model: String,
    choices: [CompletionChoice; 1],
    usage: Usage,
}

#[derive(Debug, Serialize)]
struct CompletionChoice {
    index: u32,
    message: CompletionMessage,
    finish_reason: FinishReason,
}

#[derive(Debug, Serialize)]
struct CompletionMessage {
    role: &'static str,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<[FunctionCall; 1]>,
}

/// `GET /v1/models`
pub async fn list_models() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "object": "list",
        "data": models::catalog(),
    }))
}

pub async fn chat_completions(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<ChatCompletionRequest>,
) -> Result<Response, ApiError> {
    tracing::info!(
        "Chat completion request: model={}, messages={}, stream={}, temperature={}, max_tokens={}",
        request.model,
        request.messages.len(),
        request.stream,
        request.temperature,
        request.max_tokens
    );

    let transcript = Transcript::build(&request.messages);
    if !transcript.has_user {
        return Err(ApiError::BadRequest {
            detail: "No user message found".to_string(),
        });
    }
    if models::lookup(&request.model).is_none() {
        return Err(ApiError::ModelNotFound(request.model));
    }
    if transcript.has_tool_call {
        tracing::debug!("Conversation contains earlier tool calls");
    }

    if request.stream {
        Ok(stream_completion(&state, &request.model, &transcript).await)
    } else {
        Ok(full_completion(&state, &request.model, &transcript).await)
    }
}

async fn full_completion(state: &AppState, model: &str, transcript: &Transcript) -> Response {
    let text = reply_text(complete(state, model, &transcript.prompt).await);

    let message = match tool_call::extract(&text, transcript.has_tool_result) {
        Some(envelope) => {
            tracing::info!("Detected tool call: {} {}", envelope.tool, envelope.command);
            CompletionMessage {
                role: "assistant",
                content: None,
                tool_calls: Some([FunctionCall::from_envelope(&envelope)]),
            }
        }
        None => CompletionMessage {
            role: "assistant",
            content: Some(text.clone()),
            tool_calls: None,
        },
    };
    let finish_reason = if message.tool_calls.is_some() {
        FinishReason::ToolCalls
    } else {
        FinishReason::Stop
    };

    Json(Completion {
        id: format!("chatcmpl-{}", uuid::Uuid::new_v4().simple()),
        object: "chat.completion",
        created: unix_now(),
        model: model.to_string(),
        choices: [CompletionChoice {
            index: 0,
            message,
            finish_reason,
        }],
        usage: Usage::from_text(&transcript.prompt, &text),
    })
    .into_response()
}

/// Buffer the whole stream, then replay it or replace it with a tool call
async fn stream_completion(state: &AppState, model: &str, transcript: &Transcript) -> Response {
    let chunks: Vec<StreamChunk> = match state.orchestrator.send(model, &transcript.prompt).await {
        Ok(events) => transcode(events).collect().await,
        Err(e) => {
            tracing::error!(error_type = e.category(), error_message = %e, "Request failed");
            StreamTranscoder::failure(&e.to_string())
        }
    };

    let text = delta_text(&chunks);
    let chunks = match tool_call::extract(&text, transcript.has_tool_result) {
        Some(envelope) => {
            tracing::info!(
                "Detected tool call in stream: {} {}",
                envelope.tool,
                envelope.command
            );
            vec![
                StreamChunk::ToolCall(envelope),
                StreamChunk::Finish(FinishReason::ToolCalls),
                StreamChunk::Done,
            ]
        }
        None => {
            tracing::debug!("Replaying {} buffered chunks", chunks.len());
            chunks
        }
    };

    let encoder = ChunkEncoder::new(model);
    let frames: Vec<String> = chunks.iter().map(|chunk| encoder.encode(chunk)).collect();
    sse_response(stream::iter(frames).boxed())
}
