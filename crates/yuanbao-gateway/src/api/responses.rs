//! `POST /v1/responses`
//!
//! A thin variant of chat completions: only the last message is sent, no
//! tool-call detection happens, and streamed chunks are forwarded as soon as
//! they are produced.

use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use futures::stream;
use serde::Serialize;
use std::sync::Arc;

use super::openai::{ChatCompletionRequest, Usage};
use super::sse::{ChunkEncoder, sse_response};
use super::{ApiJson, AppState, complete, reply_text, unix_now};
use crate::stream::{FinishReason, StreamTranscoder, transcode};

const NO_USER_MESSAGE: &str = "No user message found";

#[derive(Debug, Serialize)]
struct ResponseObject {
    id: String,
    object: &'static str,
    created: i64,
    model: String,
    choices: [ResponseChoice; 1],
    usage: Usage,
}

#[derive(Debug, Serialize)]
struct ResponseChoice {
    index: u32,
    message: ResponseMessage,
    finish_reason: FinishReason,
}

#[derive(Debug, Serialize)]
struct ResponseMessage {
    role: &'static str,
    content: String,
}

pub async fn responses(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<ChatCompletionRequest>,
) -> Response {
    tracing::info!(
        "Responses request: model={}, messages={}, stream={}",
        request.model,
        request.messages.len(),
        request.stream
    );

    let prompt = request
        .messages
        .last()
        .map(|m| m.content_text())
        .unwrap_or_default();

    if request.stream {
        return stream_response(&state, &request.model, &prompt).await;
    }

    let content = if prompt.is_empty() {
        NO_USER_MESSAGE.to_string()
    } else {
        reply_text(complete(&state, &request.model, &prompt).await)
    };

    Json(ResponseObject {
        id: format!("resp-{}", uuid::Uuid::new_v4().simple()),
        object: "response",
        created: unix_now(),
        usage: Usage::from_text(&prompt, &content),
        model: request.model,
        choices: [ResponseChoice {
            index: 0,
            message: ResponseMessage {
                role: "assistant",
                content,
            },
            finish_reason: FinishReason::Stop,
        }],
    })
    .into_response()
}

async fn stream_response(state: &AppState, model: &str, prompt: &str) -> Response {
    let encoder = ChunkEncoder::new(model);

    if prompt.is_empty() {
        let frames: Vec<String> = StreamTranscoder::failure(NO_USER_MESSAGE)
            .iter()
            .map(|chunk| encoder.encode(chunk))
            .collect();
        return sse_response(stream::iter(frames).boxed());
    }

    match state.orchestrator.send(model, prompt).await {
        Ok(events) => {
            let frames = transcode(events).map(move |chunk| encoder.encode(&chunk));
            sse_response(frames.boxed())
        }
        Err(e) => {
            tracing::error!(error_type = e.category(), error_message = %e, "Request failed");
            let frames: Vec<String> = StreamTranscoder::failure(&e.to_string())
                .iter()
                .map(|chunk| encoder.encode(chunk))
                .collect();
            sse_response(stream::iter(frames).boxed())
        }
    }
}
