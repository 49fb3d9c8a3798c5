//! Normalized events to relay wire frames.

use std::sync::Arc;

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use tracing::{error, info};

use agent_relay_core::config::ToolNaming;
use agent_relay_core::{NormalizedEvent, WireFrame};

use crate::normalizer::normalize;
use crate::{InvokeRequest, Transport};

/// Message carried by the `error` frame when an invocation fails.
pub const INVOKE_FAILED_MESSAGE: &str = "Failed to invoke agent";

/// Encode each event as a `data: <json>\n\n` frame.
///
/// If `events` fails, a single `error` frame is written and the stream ends.
pub fn encode_frames<S>(events: S) -> impl Stream<Item = String> + Send
where
    S: Stream<Item = anyhow::Result<NormalizedEvent>> + Send + 'static,
{
    futures::stream::unfold(
        (Box::pin(events), false),
        |(mut events, failed)| async move {
            if failed {
                return None;
            }
            loop {
                let (frame, failed) = match events.next().await? {
                    Ok(event) => (WireFrame::from(event), false),
                    Err(e) => (
                        WireFrame::error(INVOKE_FAILED_MESSAGE, Some(format!("{e:#}"))),
                        true,
                    ),
                };
                match frame.encode() {
                    Ok(encoded) => return Some((encoded, (events, failed))),
                    Err(e) => {
                        error!(%e, "Failed to serialize wire frame");
                        if failed {
                            return None;
                        }
                    }
                }
            }
        },
    )
}

/// Run one invocation end to end: open the transport, normalize the body,
/// and encode relay frames.
///
/// A transport that cannot be opened produces a single `error` frame.
pub fn relay(
    transport: Arc<dyn Transport>,
    request: InvokeRequest,
    naming: ToolNaming,
) -> BoxStream<'static, String> {
    futures::stream::once(async move {
        info!(
            transport = transport.id(),
            session_id = %request.session_id,
            "Invoking agent runtime"
        );
        transport.open(&request).await
    })
    .flat_map(move |opened| match opened {
        Ok(chunks) => encode_frames(normalize(chunks, naming.clone())).boxed(),
        Err(e) => {
            error!(error = %format!("{e:#}"), "Failed to invoke agent");
            let failure = WireFrame::error(INVOKE_FAILED_MESSAGE, Some(format!("{e:#}")));
            futures::stream::iter(failure.encode().ok()).boxed()
        }
    })
    .boxed()
}
