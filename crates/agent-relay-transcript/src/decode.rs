//! Relay wire frames back into normalized events.

use std::collections::VecDeque;
use std::pin::Pin;

use futures::Stream;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use agent_relay_core::lines::LineDecoder;
use agent_relay_core::{NormalizedEvent, WireFrame};

/// Decode a relay response body into normalized events.
///
/// An `error` frame or a failing body ends the stream with a single error.
/// Frames that do not parse are skipped with a warning.
pub fn decode_frames<S, B, E>(body: S) -> impl Stream<Item = anyhow::Result<NormalizedEvent>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<anyhow::Error> + Send + 'static,
{
    futures::stream::unfold(
        DecodeState {
            body: Box::pin(body),
            decoder: LineDecoder::new(),
            ready: VecDeque::new(),
            done: false,
            failed: false,
        },
        |mut state| async move {
            loop {
                if let Some(item) = state.ready.pop_front() {
                    return Some((item, state));
                }
                if state.done {
                    return None;
                }

                match state.body.next().await {
                    Some(Ok(chunk)) => {
                        let lines = state.decoder.push(chunk.as_ref());
                        state.accept_lines(lines);
                    }
                    Some(Err(e)) => {
                        state.done = true;
                        let e: anyhow::Error = e.into();
                        return Some((Err(e.context("relay stream failed")), state));
                    }
                    None => {
                        state.done = true;
                        let tail: Vec<String> = state.decoder.finish().into_iter().collect();
                        state.accept_lines(tail);
                        debug!("Relay stream completed");
                    }
                }
            }
        },
    )
}

struct DecodeState<B, E> {
    body: Pin<Box<dyn Stream<Item = Result<B, E>> + Send>>,
    decoder: LineDecoder,
    ready: VecDeque<anyhow::Result<NormalizedEvent>>,
    done: bool,
    failed: bool,
}

impl<B, E> DecodeState<B, E> {
    fn accept_lines(&mut self, lines: Vec<String>) {
        for line in lines {
            // Nothing after an error frame is delivered.
            if self.failed {
                return;
            }
            match WireFrame::parse_line(&line) {
                None => {}
                Some(Err(e)) => warn!(%e, line = %line, "Skipping malformed relay frame"),
                Some(Ok(frame)) => match frame.into_event() {
                    Ok(event) => self.ready.push_back(Ok(event)),
                    Err(e) => {
                        self.ready.push_back(Err(e.into()));
                        self.failed = true;
                        self.done = true;
                    }
                },
            }
        }
    }
}
