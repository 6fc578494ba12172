//! Reshaping of backend events into client output
//!
//! [`segments`] groups raw events into sentences, [`transcode`] turns them
//! into streamed chunks and [`assemble`] collects them into a single answer.
//! Streaming and non-streaming renderings of the same events carry the same
//! text.

mod accumulator;
mod transcoder;

pub use accumulator::{Segment, SentenceAccumulator};
pub use transcoder::{
    AssembledAnswer, FinishReason, Role, StreamChunk, StreamTranscoder, THINK_CLOSE, THINK_OPEN,
};

use futures::stream::{self, BoxStream, StreamExt};

use crate::backend::VendorEventStream;

/// Sentence segments of a backend response
pub fn segments(events: VendorEventStream) -> BoxStream<'static, Segment> {
    events
        .scan(SentenceAccumulator::new(), |acc, event| {
            let out = acc.push(event);
            futures::future::ready(Some(stream::iter(out)))
        })
        .flatten()
        .boxed()
}

/// Client chunks of a backend response
pub fn transcode(events: VendorEventStream) -> BoxStream<'static, StreamChunk> {
    segments(events)
        .scan(StreamTranscoder::new(), |transcoder, segment| {
            let out = transcoder.push(segment);
            futures::future::ready(Some(stream::iter(out)))
        })
        .flatten()
        .boxed()
}

/// Collect a whole backend response
pub async fn assemble(events: VendorEventStream) -> AssembledAnswer {
    segments(events)
        .fold(AssembledAnswer::default(), |mut answer, segment| async move {
            answer.push(segment);
            answer
        })
        .await
}

/// Concatenated text content of `chunks`
pub fn delta_text(chunks: &[StreamChunk]) -> String {
    chunks
        .iter()
        .filter_map(|chunk| match chunk {
            StreamChunk::Delta { content, .. } => Some(content.as_str()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::VendorEvent;

    fn events(list: Vec<VendorEvent>) -> VendorEventStream {
        stream::iter(list).boxed()
    }

    fn sample() -> Vec<VendorEvent> {
        vec![
            VendorEvent::Reasoning("想".to_string()),
            VendorEvent::Reasoning("一想".to_string()),
            VendorEvent::Reasoning("。".to_string()),
            VendorEvent::Reasoning("再想".to_string()),
            VendorEvent::Answer("结论".to_string()),
            VendorEvent::Answer("如下".to_string()),
            VendorEvent::End,
        ]
    }

    #[tokio::test]
    async fn test_segments_group_sentences() {
        let segs: Vec<Segment> = segments(events(sample())).collect().await;
        assert_eq!(
            segs,
            vec![
                Segment::Thought("想一想。".to_string()),
                Segment::Thought("再想".to_string()),
                Segment::Answer("结论".to_string()),
                Segment::Answer("如下".to_string()),
                Segment::End,
            ]
        );
    }

    #[tokio::test]
    async fn test_streaming_and_assembled_text_agree() {
        let chunks: Vec<StreamChunk> = transcode(events(sample())).collect().await;
        let assembled = assemble(events(sample())).await;

        assert_eq!(delta_text(&chunks), assembled.render());
        assert_eq!(chunks.last(), Some(&StreamChunk::Done));
    }

    #[tokio::test]
    async fn test_assemble_answer_only() {
        let assembled = assemble(events(vec![
            VendorEvent::Answer("a".to_string()),
            VendorEvent::Answer("b".to_string()),
            VendorEvent::End,
        ]))
        .await;
        assert!(assembled.thoughts.is_empty());
        assert_eq!(assembled.render(), "ab");
    }
}
