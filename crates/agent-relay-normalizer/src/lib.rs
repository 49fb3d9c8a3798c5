//! Upstream stream normalization.
//!
//! A [`Transport`] yields the agent runtime's raw response body as byte
//! chunks. [`normalize`] recovers the embedded `data: <json>` records and
//! reduces them to [`NormalizedEvent`]s, and [`relay`] re-encodes those as
//! relay wire frames.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde::Serialize;

use agent_relay_core::config::Config;
use agent_relay_core::session::SessionId;
use agent_relay_core::{RelayError, Result};

pub mod classify;
pub mod http;
pub mod normalizer;
pub mod reader;
pub mod relay;

pub use agent_relay_core::NormalizedEvent;
pub use normalizer::normalize;
pub use relay::{encode_frames, relay};

/// Raw response body chunks, in arrival order.
pub type ByteStream = Pin<Box<dyn Stream<Item = anyhow::Result<Bytes>> + Send>>;

/// One agent invocation.
#[derive(Debug, Clone)]
pub struct InvokeRequest {
    pub prompt: String,
    pub tool_api_key: String,
    pub session_id: SessionId,
}

/// JSON body sent to the agent runtime.
#[derive(Debug, Serialize)]
pub struct InvokePayload<'a> {
    pub prompt: &'a str,
    pub tavily_api_key: &'a str,
}

impl InvokeRequest {
    /// Validate a prompt and resolve the tool API key against `config`.
    pub fn new(config: &Config, prompt: &str, client_tool_api_key: Option<&str>) -> Result<Self> {
        if prompt.trim().is_empty() {
            return Err(RelayError::InvalidRequest("prompt is required".into()));
        }
        let tool_api_key = config.tool_api_key(client_tool_api_key).ok_or_else(|| {
            RelayError::InvalidRequest(
                "Tool API key is required (set TAVILY_API_KEY or provide it in the request)".into(),
            )
        })?;

        Ok(Self {
            prompt: prompt.to_string(),
            tool_api_key,
            session_id: SessionId::generate(),
        })
    }

    pub fn payload(&self) -> InvokePayload<'_> {
        InvokePayload {
            prompt: &self.prompt,
            tavily_api_key: &self.tool_api_key,
        }
    }
}

/// Supplies the raw upstream body for an invocation.
///
/// Implementations own connection setup, authentication, and retries. The
/// returned stream must end when the body ends and yield an error if the
/// body fails; dropping it must release the connection.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transport identifier (e.g., "http", "file").
    fn id(&self) -> &str;

    /// Start an invocation and return its body stream.
    async fn open(&self, request: &InvokeRequest) -> anyhow::Result<ByteStream>;
}
