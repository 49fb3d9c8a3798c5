//! HTTP transport for the agent runtime's invocation endpoint.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tracing::debug;

use agent_relay_core::RelayError;

use crate::{ByteStream, InvokeRequest, Transport};

/// Header carrying the runtime session id.
pub const SESSION_ID_HEADER: &str = "X-Amzn-Bedrock-AgentCore-Runtime-Session-Id";

pub struct HttpTransport {
    pub url: String,
    client: reqwest::Client,
}

impl HttpTransport {
    /// `timeout` bounds connecting and each wait for the next body chunk.
    /// A long answer that keeps streaming is never cut off.
    pub fn new(url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()?;
        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn id(&self) -> &str {
        "http"
    }

    async fn open(&self, request: &InvokeRequest) -> anyhow::Result<ByteStream> {
        debug!(url = %self.url, session_id = %request.session_id, "POST invocation");

        let response = self
            .client
            .post(&self.url)
            .header(SESSION_ID_HEADER, request.session_id.as_str())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&request.payload())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::Transport(format!(
                "Agent runtime returned {status}: {body}"
            ))
            .into());
        }

        Ok(Box::pin(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(anyhow::Error::from)),
        ))
    }
}
