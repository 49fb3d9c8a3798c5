//! Append-only list of display messages.

use serde::{Deserialize, Serialize};

use agent_relay_core::DisplayMessage;

/// An ordered conversation transcript.
///
/// Entries are only ever appended; the last entry (the open message) is the
/// only one that may still change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    messages: Vec<DisplayMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[DisplayMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The open message.
    pub fn last(&self) -> Option<&DisplayMessage> {
        self.messages.last()
    }

    /// Append a message and return its index.
    pub fn push(&mut self, message: DisplayMessage) -> usize {
        self.messages.push(message);
        self.messages.len() - 1
    }

    /// Mutable access to the open message.
    pub fn open_mut(&mut self) -> Option<&mut DisplayMessage> {
        self.messages.last_mut()
    }
}

impl From<Vec<DisplayMessage>> for Transcript {
    fn from(messages: Vec<DisplayMessage>) -> Self {
        Self { messages }
    }
}
