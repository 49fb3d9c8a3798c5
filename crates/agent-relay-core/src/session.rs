//! Per-invocation runtime session identifiers.

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{RelayError, Result};

/// The upstream runtime rejects session ids shorter than this.
pub const MIN_SESSION_ID_LEN: usize = 33;

/// An opaque runtime session identifier, at least 33 characters long.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// `session-<unix millis>-<uuid>`; always well over the minimum length.
    pub fn generate() -> Self {
        Self(format!(
            "session-{}-{}",
            Utc::now().timestamp_millis(),
            Uuid::new_v4().simple()
        ))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        if raw.chars().count() < MIN_SESSION_ID_LEN {
            return Err(RelayError::InvalidRequest(format!(
                "session id must be at least {MIN_SESSION_ID_LEN} characters, got {}",
                raw.chars().count()
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SessionId {
    type Error = RelayError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}
