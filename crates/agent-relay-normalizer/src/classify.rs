//! Classification of upstream `data:` records.
//!
//! The provider wraps every streaming event in an `event` object with deeply
//! nested, provider-owned field names. Nothing past this module sees them.

use serde_json::Value;
use tracing::{debug, trace};

use agent_relay_core::NormalizedEvent;
use agent_relay_core::config::ToolNaming;
use agent_relay_core::event::DATA_PREFIX;

/// Classify one upstream line into zero, one, or two normalized events.
///
/// Lines that are not records, quoted bare strings, malformed JSON, frames
/// without an `event`, and unknown shapes all yield nothing.
pub fn classify_line(line: &str, naming: &ToolNaming) -> Vec<NormalizedEvent> {
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return Vec::new();
    };

    if payload.starts_with('"') || payload.starts_with('\'') {
        trace!("Skipping quoted string record");
        return Vec::new();
    }

    let parsed: Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(e) => {
            trace!(%e, "Skipping non-JSON record");
            return Vec::new();
        }
    };

    let Some(event) = parsed.get("event").filter(|e| is_truthy(e)) else {
        trace!("Skipping record without event");
        return Vec::new();
    };

    classify_event(event, naming)
}

/// Map a provider `event` object onto normalized events.
pub fn classify_event(event: &Value, naming: &ToolNaming) -> Vec<NormalizedEvent> {
    let mut out = Vec::new();

    if let Some(tool_use) = event
        .pointer("/contentBlockStart/start/toolUse")
        .filter(|t| is_truthy(t))
    {
        let tool = naming.resolve(tool_use);
        debug!(tool = %tool, "Tool use started");
        out.push(NormalizedEvent::ToolUse { tool });
    }

    if let Some(text) = event
        .pointer("/contentBlockDelta/delta/text")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
    {
        trace!(len = text.len(), "Text delta");
        out.push(NormalizedEvent::Text {
            data: text.to_string(),
        });
    }

    out
}

/// Presence check matching how the provider's SDKs test optional fields:
/// `null`, `false`, `0` and `""` count as absent.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
