//! Byte stream to normalized event stream.

use std::collections::VecDeque;
use std::pin::Pin;

use futures::{Stream, StreamExt};
use tracing::{debug, error};

use agent_relay_core::NormalizedEvent;
use agent_relay_core::config::ToolNaming;
use agent_relay_core::lines::LineDecoder;

use crate::classify::classify_line;

/// Normalize a raw upstream body into [`NormalizedEvent`]s.
///
/// The returned stream is lazy: it only pulls a chunk when the consumer
/// asks for the next event and nothing is buffered. It ends when `chunks`
/// ends. If `chunks` fails, the error is yielded once and the stream ends.
/// Dropping the stream drops `chunks`.
pub fn normalize<S, B>(
    chunks: S,
    naming: ToolNaming,
) -> impl Stream<Item = anyhow::Result<NormalizedEvent>> + Send
where
    S: Stream<Item = anyhow::Result<B>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    futures::stream::unfold(
        NormalizerState {
            chunks: Box::pin(chunks),
            decoder: LineDecoder::new(),
            ready: VecDeque::new(),
            naming,
            done: false,
            emitted: 0,
        },
        |mut state| async move {
            loop {
                if let Some(event) = state.ready.pop_front() {
                    state.emitted += 1;
                    return Some((Ok(event), state));
                }
                if state.done {
                    return None;
                }

                match state.chunks.next().await {
                    Some(Ok(chunk)) => {
                        for line in state.decoder.push(chunk.as_ref()) {
                            state.ready.extend(classify_line(&line, &state.naming));
                        }
                    }
                    Some(Err(e)) => {
                        state.done = true;
                        error!(%e, emitted = state.emitted, "Upstream stream failed");
                        return Some((Err(e.context("upstream stream failed")), state));
                    }
                    None => {
                        state.done = true;
                        if let Some(line) = state.decoder.finish() {
                            state.ready.extend(classify_line(&line, &state.naming));
                        }
                        debug!(emitted = state.emitted + state.ready.len(), "Upstream stream completed");
                    }
                }
            }
        },
    )
}

struct NormalizerState<B> {
    chunks: Pin<Box<dyn Stream<Item = anyhow::Result<B>> + Send>>,
    decoder: LineDecoder,
    ready: VecDeque<NormalizedEvent>,
    naming: ToolNaming,
    done: bool,
    emitted: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use bytes::Bytes;

    async fn collect(chunks: Vec<&'static str>) -> Vec<anyhow::Result<NormalizedEvent>> {
        let stream = futures::stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok(Bytes::from_static(c.as_bytes()))),
        );
        normalize(stream, ToolNaming::default()).collect().await
    }

    #[tokio::test]
    async fn test_record_split_across_chunks() {
        let events = collect(vec![
            r#"data: {"event":{"contentBlockDelta":{"del"#,
            "ta\":{\"text\":\"Hi\"}}}}\n",
        ])
        .await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap(), &NormalizedEvent::text("Hi"));
    }

    #[tokio::test]
    async fn test_unterminated_last_line_is_flushed() {
        let events =
            collect(vec![r#"data: {"event":{"contentBlockDelta":{"delta":{"text":"end"}}}}"#]).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap(), &NormalizedEvent::text("end"));
    }

    #[tokio::test]
    async fn test_empty_input_completes_without_events() {
        assert!(collect(vec![]).await.is_empty());
    }

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_dropping_consumer_releases_body() {
        let dropped = Arc::new(AtomicBool::new(false));
        let flag = DropFlag(dropped.clone());
        // One record, then a body that never ends.
        let body = futures::stream::iter(vec![Ok(Bytes::from_static(
            b"data: {\"event\":{\"contentBlockDelta\":{\"delta\":{\"text\":\"a\"}}}}\n",
        ))])
        .chain(futures::stream::pending())
        .map(move |chunk: anyhow::Result<Bytes>| {
            let _held = &flag;
            chunk
        });

        let mut events = Box::pin(normalize(body, ToolNaming::default()));
        let first = events.next().await.unwrap().unwrap();
        assert_eq!(first, NormalizedEvent::text("a"));
        assert!(!dropped.load(Ordering::SeqCst));

        drop(events);
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_failure_is_yielded_once_then_ends() {
        let chunks: Vec<anyhow::Result<Bytes>> = vec![
            Ok(Bytes::from_static(
                b"data: {\"event\":{\"contentBlockDelta\":{\"delta\":{\"text\":\"a\"}}}}\n",
            )),
            Err(anyhow::anyhow!("connection reset")),
            Ok(Bytes::from_static(
                b"data: {\"event\":{\"contentBlockDelta\":{\"delta\":{\"text\":\"b\"}}}}\n",
            )),
        ];
        let events: Vec<_> = normalize(futures::stream::iter(chunks), ToolNaming::default())
            .collect()
            .await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].as_ref().unwrap(), &NormalizedEvent::text("a"));
        let err = events[1].as_ref().unwrap_err();
        assert!(format!("{err:#}").contains("connection reset"));
    }
}
