//! Server-sent event framing of stream chunks

use axum::body::Body;
use axum::http::{StatusCode, header};
use axum::response::Response;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use serde::Serialize;

use crate::stream::{FinishReason, Role, StreamChunk};
use crate::tool_call::ToolCallEnvelope;

/// Terminal frame of every stream
pub const DONE_FRAME: &str = "data: [DONE]\n\n";

#[derive(Serialize)]
struct ChunkBody<'a> {
    id: &'a str,
    object: &'static str,
    created: i64,
    model: &'a str,
    choices: [ChunkChoice<'a>; 1],
}

#[derive(Serialize)]
struct ChunkChoice<'a> {
    index: u32,
    delta: ChunkDelta<'a>,
    finish_reason: Option<FinishReason>,
}

#[derive(Serialize, Default)]
struct ChunkDelta<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<[StreamToolCall; 1]>,
}

#[derive(Serialize)]
struct StreamToolCall {
    index: u32,
    #[serde(flatten)]
    call: FunctionCall,
}

/// An OpenAI `tool_calls` entry
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FunctionCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: FunctionSpec,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FunctionSpec {
    pub name: String,
    /// JSON text of `{"command", "args"}`
    pub arguments: String,
}

#[derive(Serialize)]
struct FunctionArguments<'a> {
    command: &'a str,
    args: &'a [String],
}

impl FunctionCall {
    /// OpenAI function call for an extracted envelope, with a fresh id
    pub fn from_envelope(envelope: &ToolCallEnvelope) -> Self {
        let arguments = serde_json::to_string(&FunctionArguments {
            command: &envelope.command,
            args: &envelope.args,
        })
        .unwrap_or_else(|_| "{}".to_string());

        let name = if envelope.tool.is_empty() {
            "exec".to_string()
        } else {
            envelope.tool.clone()
        };

        Self {
            id: format!("call_{}", uuid::Uuid::new_v4().simple()),
            kind: "function",
            function: FunctionSpec { name, arguments },
        }
    }
}

/// Encodes chunks of one response as `chat.completion.chunk` frames
#[derive(Debug, Clone)]
pub struct ChunkEncoder {
    id: String,
    model: String,
    created: i64,
}

impl ChunkEncoder {
    pub fn new(model: &str) -> Self {
        Self {
            id: format!("chatcmpl-{}", uuid::Uuid::new_v4().simple()),
            model: model.to_string(),
            created: super::unix_now(),
        }
    }

    /// The SSE frame for `chunk`
    pub fn encode(&self, chunk: &StreamChunk) -> String {
        let (delta, finish_reason) = match chunk {
            StreamChunk::Delta { role, content } => (
                ChunkDelta {
                    role: *role,
                    content: Some(content.as_str()),
                    ..Default::default()
                },
                None,
            ),
            StreamChunk::ToolCall(envelope) => (
                ChunkDelta {
                    role: Some(Role::Assistant),
                    tool_calls: Some([StreamToolCall {
                        index: 0,
                        call: FunctionCall::from_envelope(envelope),
                    }]),
                    ..Default::default()
                },
                None,
            ),
            StreamChunk::Finish(reason) => (ChunkDelta::default(), Some(*reason)),
            StreamChunk::Done => return DONE_FRAME.to_string(),
        };

        let body = ChunkBody {
            id: &self.id,
            object: "chat.completion.chunk",
            created: self.created,
            model: &self.model,
            choices: [ChunkChoice {
                index: 0,
                delta,
                finish_reason,
            }],
        };
        match serde_json::to_string(&body) {
            Ok(json) => format!("data: {json}\n\n"),
            Err(e) => {
                tracing::error!("Failed to encode stream chunk: {e}");
                String::new()
            }
        }
    }
}

/// `text/event-stream` response over already-encoded frames
pub fn sse_response(frames: BoxStream<'static, String>) -> Response {
    let body = Body::from_stream(frames.map(|frame| Ok::<_, std::convert::Infallible>(Bytes::from(frame))));
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(body)
        .unwrap_or_else(|_| Response::new(Body::empty()))
}
