//! Segment to client chunk transcoding
//!
//! Thoughts are wrapped in a `<think>` block that opens on the first thought
//! and closes when the answer starts (or at the end of the response). Only
//! the very first chunk of a response carries the assistant role.

use serde::Serialize;

use super::accumulator::Segment;
use crate::tool_call::ToolCallEnvelope;

/// Opens a reasoning block
pub const THINK_OPEN: &str = "<think>\n";

/// Closes a reasoning block
pub const THINK_CLOSE: &str = "</think>\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    ToolCalls,
}

/// One unit of a client-facing streamed response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    /// Text content, with the role on the first chunk only
    Delta { role: Option<Role>, content: String },
    /// A synthesized tool call replacing the text content
    ToolCall(ToolCallEnvelope),
    /// Empty delta carrying the finish reason
    Finish(FinishReason),
    /// Stream terminator
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Idle,
    Thinking,
    Answering,
    Done,
}

/// Streaming state machine from segments to chunks
#[derive(Debug, Default)]
pub struct StreamTranscoder {
    phase: Phase,
    role_sent: bool,
}

impl StreamTranscoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chunks for a response that failed before any content arrived
    pub fn failure(message: &str) -> Vec<StreamChunk> {
        vec![
            StreamChunk::Delta {
                role: Some(Role::Assistant),
                content: message.to_string(),
            },
            StreamChunk::Finish(FinishReason::Stop),
            StreamChunk::Done,
        ]
    }

    /// Feed one segment and collect the chunks it produces
    pub fn push(&mut self, segment: Segment) -> Vec<StreamChunk> {
        let mut out = Vec::new();
        match (segment, self.phase) {
            (_, Phase::Done) => {}
            (Segment::Thought(text), phase) => {
                if phase != Phase::Thinking {
                    self.delta(&mut out, THINK_OPEN.to_string());
                    self.phase = Phase::Thinking;
                }
                self.delta(&mut out, format!("{text}\n"));
            }
            (Segment::Answer(text), phase) => {
                if phase == Phase::Thinking {
                    self.delta(&mut out, THINK_CLOSE.to_string());
                }
                self.phase = Phase::Answering;
                self.delta(&mut out, text);
            }
            (Segment::End, phase) => {
                if phase == Phase::Thinking {
                    self.delta(&mut out, THINK_CLOSE.to_string());
                }
                self.phase = Phase::Done;
                out.push(StreamChunk::Finish(FinishReason::Stop));
                out.push(StreamChunk::Done);
            }
        }
        out
    }

    fn delta(&mut self, out: &mut Vec<StreamChunk>, content: String) {
        let role = if self.role_sent {
            None
        } else {
            self.role_sent = true;
            Some(Role::Assistant)
        };
        out.push(StreamChunk::Delta { role, content });
    }
}

/// Full non-streaming answer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssembledAnswer {
    pub thoughts: Vec<String>,
    pub answer: String,
}

impl AssembledAnswer {
    pub fn push(&mut self, segment: Segment) {
        match segment {
            Segment::Thought(text) => self.thoughts.push(text),
            Segment::Answer(text) => self.answer.push_str(&text),
            Segment::End => {}
        }
    }

    /// Text returned to non-streaming clients
    pub fn render(&self) -> String {
        if self.thoughts.is_empty() {
            self.answer.clone()
        } else {
            format!(
                "{THINK_OPEN}{}\n{THINK_CLOSE}{}",
                self.thoughts.join("\n"),
                self.answer
            )
        }
    }
}
