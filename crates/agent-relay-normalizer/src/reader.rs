//! Replay a captured response body from a file or stdin.

use std::path::PathBuf;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;

use crate::{ByteStream, InvokeRequest, Transport};

/// Wrap any async reader as a body stream.
pub fn reader_stream<R>(reader: R) -> ByteStream
where
    R: AsyncRead + Send + 'static,
{
    Box::pin(ReaderStream::new(reader).map(|chunk| chunk.map_err(anyhow::Error::from)))
}

/// Where a [`ReaderTransport`] reads from.
#[derive(Debug, Clone)]
pub enum ReaderSource {
    File(PathBuf),
    Stdin,
}

/// A transport that ignores the request and streams a recorded body.
pub struct ReaderTransport {
    source: ReaderSource,
}

impl ReaderTransport {
    pub fn new(source: ReaderSource) -> Self {
        Self { source }
    }

    /// `None` or `-` means stdin.
    pub fn from_arg(path: Option<&str>) -> Self {
        match path {
            None | Some("-") => Self::new(ReaderSource::Stdin),
            Some(p) => Self::new(ReaderSource::File(PathBuf::from(p))),
        }
    }
}

#[async_trait]
impl Transport for ReaderTransport {
    fn id(&self) -> &str {
        match self.source {
            ReaderSource::File(_) => "file",
            ReaderSource::Stdin => "stdin",
        }
    }

    /// The request is ignored; the recorded body is replayed as is.
    async fn open(&self, _request: &InvokeRequest) -> anyhow::Result<ByteStream> {
        match &self.source {
            ReaderSource::File(path) => {
                let file = tokio::fs::File::open(path)
                    .await
                    .map_err(|e| anyhow::anyhow!("Failed to open {}: {e}", path.display()))?;
                Ok(reader_stream(file))
            }
            ReaderSource::Stdin => Ok(reader_stream(tokio::io::stdin())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use agent_relay_core::config::ToolNaming;
    use agent_relay_core::session::SessionId;

    fn request() -> InvokeRequest {
        InvokeRequest {
            prompt: "recorded".into(),
            tool_api_key: String::new(),
            session_id: SessionId::generate(),
        }
    }

    #[tokio::test]
    async fn test_file_body_is_streamed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("body.txt");
        std::fs::write(&path, b"data: one\ndata: two\n").unwrap();

        let transport = ReaderTransport::from_arg(path.to_str());
        assert_eq!(transport.id(), "file");

        let mut body = transport.open(&request()).await.unwrap();
        let mut bytes = Vec::new();
        while let Some(chunk) = body.next().await {
            bytes.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(bytes, b"data: one\ndata: two\n");
    }

    #[tokio::test]
    async fn test_missing_file_fails_to_open() {
        let transport = ReaderTransport::from_arg(Some("/nonexistent/agent-relay/body.txt"));
        let err = transport.open(&request()).await.err().unwrap();
        assert!(err.to_string().contains("Failed to open"));
    }

    #[tokio::test]
    async fn test_recorded_body_relays_like_a_live_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upstream.txt");
        std::fs::write(
            &path,
            "data: {\"event\":{\"contentBlockStart\":{\"start\":{\"toolUse\":{}}}}}\n\
             data: {\"event\":{\"contentBlockDelta\":{\"delta\":{\"text\":\"ok\"}}}}\n",
        )
        .unwrap();

        let transport = Arc::new(ReaderTransport::from_arg(path.to_str()));
        let frames: Vec<String> = crate::relay(transport, request(), ToolNaming::default())
            .collect()
            .await;
        assert_eq!(
            frames,
            vec![
                "data: {\"type\":\"tool_use\",\"tool\":\"tavily\"}\n\n".to_string(),
                "data: {\"type\":\"text\",\"data\":\"ok\"}\n\n".to_string(),
            ]
        );
    }

    #[test]
    fn test_dash_means_stdin() {
        assert_eq!(ReaderTransport::from_arg(Some("-")).id(), "stdin");
        assert_eq!(ReaderTransport::from_arg(None).id(), "stdin");
    }
}
