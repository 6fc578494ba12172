//! Sentence-level grouping of reasoning fragments
//!
//! The backend streams reasoning a few characters at a time. Fragments are
//! buffered until one of them is a sentence terminal on its own, and the
//! buffer is then released as a single thought.

use crate::backend::VendorEvent;

/// Fragments that close a sentence when they arrive on their own
const SENTENCE_TERMINALS: &[&str] = &["。", "？", "！", ".", "?", "!"];

/// Accumulator output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// A completed, non-empty reasoning sentence
    Thought(String),
    /// An answer fragment, passed through unchanged
    Answer(String),
    /// End of the backend response
    End,
}

/// Buffers reasoning fragments into sentences
#[derive(Debug, Default)]
pub struct SentenceAccumulator {
    pending: String,
}

impl SentenceAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one event and collect the segments it releases
    pub fn push(&mut self, event: VendorEvent) -> Vec<Segment> {
        let mut out = Vec::new();
        match event {
            VendorEvent::Reasoning(fragment) => {
                let terminal = SENTENCE_TERMINALS.contains(&fragment.trim());
                self.pending.push_str(&fragment);
                if terminal {
                    self.flush_into(&mut out);
                }
            }
            VendorEvent::Answer(text) => {
                self.flush_into(&mut out);
                out.push(Segment::Answer(text));
            }
            VendorEvent::End => {
                self.flush_into(&mut out);
                out.push(Segment::End);
            }
        }
        out
    }

    fn flush_into(&mut self, out: &mut Vec<Segment>) {
        let pending = std::mem::take(&mut self.pending);
        if !pending.trim().is_empty() {
            out.push(Segment::Thought(pending));
        }
    }
}
