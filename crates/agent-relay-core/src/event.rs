//! Normalized events and the relay wire format.
//!
//! The relay speaks a deliberately small protocol: one `data: <json>` frame
//! per event, each terminated by a blank line.
//!
//! ```text
//! data: {"type":"tool_use","tool":"tavily"}
//!
//! data: {"type":"text","data":"Hello"}
//!
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};

/// Prefix carried by every record line, upstream and on the relay wire.
pub const DATA_PREFIX: &str = "data: ";

/// A provider-independent stream event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NormalizedEvent {
    /// The agent started invoking an external capability.
    #[serde(rename = "tool_use")]
    ToolUse { tool: String },

    /// A text fragment to append to the open assistant message.
    #[serde(rename = "text")]
    Text { data: String },
}

impl NormalizedEvent {
    pub fn tool_use(tool: impl Into<String>) -> Self {
        Self::ToolUse { tool: tool.into() }
    }

    pub fn text(data: impl Into<String>) -> Self {
        Self::Text { data: data.into() }
    }
}

/// A single frame on the relay wire.
///
/// `Error` only ever appears as the last frame of a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WireFrame {
    #[serde(rename = "tool_use")]
    ToolUse { tool: String },

    #[serde(rename = "text")]
    Text { data: String },

    #[serde(rename = "error")]
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },
}

impl WireFrame {
    pub fn error(message: impl Into<String>, details: Option<String>) -> Self {
        Self::Error {
            message: message.into(),
            details,
        }
    }

    /// Encode as `data: <json>\n\n`.
    pub fn encode(&self) -> Result<String> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{DATA_PREFIX}{json}\n\n"))
    }

    /// Parse one wire line. Returns `None` for lines that are not records
    /// (blank separators, comments, other SSE fields).
    pub fn parse_line(line: &str) -> Option<std::result::Result<Self, serde_json::Error>> {
        let payload = line.strip_prefix(DATA_PREFIX)?;
        if payload.trim().is_empty() {
            return None;
        }
        Some(serde_json::from_str(payload))
    }

    /// Convert into a normalized event; an `Error` frame becomes
    /// [`RelayError::Upstream`].
    pub fn into_event(self) -> Result<NormalizedEvent> {
        match self {
            WireFrame::ToolUse { tool } => Ok(NormalizedEvent::ToolUse { tool }),
            WireFrame::Text { data } => Ok(NormalizedEvent::Text { data }),
            WireFrame::Error { message, details } => Err(RelayError::Upstream { message, details }),
        }
    }
}

impl From<NormalizedEvent> for WireFrame {
    fn from(event: NormalizedEvent) -> Self {
        match event {
            NormalizedEvent::ToolUse { tool } => WireFrame::ToolUse { tool },
            NormalizedEvent::Text { data } => WireFrame::Text { data },
        }
    }
}
