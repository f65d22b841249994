//! Streaming answer pipeline.
//!
//! Drives one completion stream to the caller: every provider chunk is
//! forwarded immediately in arrival order while being accumulated, and when
//! the provider signals end-of-output the full accumulated text is stamped
//! and the stamp marker is emitted as the final trailing chunk.
//!
//! The pipeline is a state machine, `Streaming -> Completed` or
//! `Streaming -> Failed`, both terminal:
//! - a provider error stops forwarding and surfaces a terminal `Err` item;
//!   chunks already delivered are not retracted and no stamp is emitted;
//! - dropping the stream (caller disconnect) drops the provider stream with
//!   it, so no further chunks are requested and no stamp is produced.

use anyhow::Result;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use tracing::warn;

use crate::completion::CompletionStream;
use crate::stamp::IntegrityStamp;

enum PipelineState {
    Streaming {
        inner: CompletionStream,
        answer: String,
    },
    Done,
}

/// Wrap a completion stream so the full answer is integrity-stamped.
///
/// The returned stream yields every content chunk of `inner` unchanged,
/// then one final chunk carrying the stamp marker for the concatenation of
/// all content chunks.
pub fn stamped_stream(inner: CompletionStream) -> Pin<Box<dyn Stream<Item = Result<String>> + Send>> {
    let state = PipelineState::Streaming {
        inner,
        answer: String::new(),
    };

    Box::pin(futures::stream::unfold(state, |state| async move {
        match state {
            PipelineState::Streaming {
                mut inner,
                mut answer,
            } => match inner.next().await {
                Some(Ok(chunk)) => {
                    answer.push_str(&chunk);
                    Some((Ok(chunk), PipelineState::Streaming { inner, answer }))
                }
                Some(Err(e)) => {
                    // Failed is terminal: stop forwarding, no stamp.
                    warn!(error = %e, "completion stream failed mid-answer");
                    Some((Err(e), PipelineState::Done))
                }
                None => {
                    let stamp = IntegrityStamp::generate(&answer);
                    Some((Ok(stamp.render_marker()), PipelineState::Done))
                }
            },
            PipelineState::Done => None,
        }
    }))
}
