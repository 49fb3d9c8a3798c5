//! Per-turn transcript state machine.
//!
//! The upstream never says when a tool finished. A tool-use episode is
//! closed by the first non-empty text that follows it: the indicator flips
//! to `completed` and the text opens a new message.
//!
//! | state          | `ToolUse`                               | `Text`                                   |
//! |----------------|-----------------------------------------|------------------------------------------|
//! | `Idle`         | placeholder becomes `pending` in place  | placeholder takes the text               |
//! | `Accumulating` | text finalized, `pending` appended      | text appended to the open message        |
//! | `ToolPending`  | indicator stays `pending`               | indicator `completed`, new text message  |
//! | `Failed`       | ignored                                 | ignored                                  |

use std::fmt;

use tracing::{debug, warn};

use agent_relay_core::{DisplayMessage, NormalizedEvent, RelayError, Result, Role, ToolState};

use crate::transcript::Transcript;

/// Notice prefix used for the message appended on failure.
pub const FAILURE_NOTICE_PREFIX: &str = "An error occurred";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReducerState {
    /// Waiting for the first output; the open message is an empty placeholder.
    Idle,
    /// Text since the last tool boundary.
    Accumulating { buffer: String },
    /// A tool episode is open; `index` is its indicator message.
    ToolPending { index: usize },
    /// A failure notice was appended; no further events are applied.
    Failed,
}

/// What to do when an event arrives without an open assistant placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strictness {
    /// Reject the event with [`RelayError::Protocol`].
    Strict,
    /// Log a warning and create the missing placeholder.
    Lenient,
}

impl Default for Strictness {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Strictness::Strict
        } else {
            Strictness::Lenient
        }
    }
}

/// One conversation turn bound to the transcript it mutates.
///
/// Created fresh per turn; no state survives into the next one.
pub struct Turn<'t> {
    transcript: &'t mut Transcript,
    state: ReducerState,
    strictness: Strictness,
}

impl<'t> Turn<'t> {
    /// Start a turn: append the user prompt and an empty assistant placeholder.
    pub fn begin(transcript: &'t mut Transcript, prompt: &str) -> Self {
        transcript.push(DisplayMessage::user(prompt));
        transcript.push(DisplayMessage::placeholder());
        Self {
            transcript,
            state: ReducerState::Idle,
            strictness: Strictness::default(),
        }
    }

    /// Continue on a transcript the caller has already prepared with a user
    /// message and an assistant placeholder.
    pub fn attach(transcript: &'t mut Transcript, strictness: Strictness) -> Self {
        Self {
            transcript,
            state: ReducerState::Idle,
            strictness,
        }
    }

    pub fn with_strictness(mut self, strictness: Strictness) -> Self {
        self.strictness = strictness;
        self
    }

    pub fn state(&self) -> &ReducerState {
        &self.state
    }

    pub fn transcript(&self) -> &Transcript {
        self.transcript
    }

    pub fn is_failed(&self) -> bool {
        self.state == ReducerState::Failed
    }

    /// Apply one event.
    pub fn apply(&mut self, event: NormalizedEvent) -> Result<()> {
        if self.is_failed() {
            return self.violation("event received after the turn failed");
        }

        match event {
            NormalizedEvent::ToolUse { tool } => {
                debug!(tool = %tool, "Tool use");
                self.on_tool_use()
            }
            // Empty fragments carry no generation and never close a tool episode.
            NormalizedEvent::Text { data } if data.is_empty() => Ok(()),
            NormalizedEvent::Text { data } => self.on_text(data),
        }
    }

    /// Append a failure notice as a distinct message and stop the turn.
    ///
    /// Earlier messages, including a still-pending tool indicator, are left
    /// as they were. Only the first failure of a turn is recorded.
    pub fn fail(&mut self, error: impl fmt::Display) {
        if self.is_failed() {
            return;
        }
        warn!(%error, "Turn failed");
        self.transcript.push(DisplayMessage::assistant(format!(
            "{FAILURE_NOTICE_PREFIX}: {error}"
        )));
        self.state = ReducerState::Failed;
    }

    fn on_tool_use(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, ReducerState::Idle) {
            ReducerState::Idle => {
                self.ensure_placeholder()?;
                let index = self.transcript.len() - 1;
                if let Some(open) = self.transcript.open_mut() {
                    *open = DisplayMessage::tool_indicator(ToolState::Pending);
                }
                self.state = ReducerState::ToolPending { index };
            }
            ReducerState::Accumulating { buffer } => {
                if let Some(open) = self.transcript.open_mut() {
                    *open = DisplayMessage::assistant(buffer);
                }
                let index = self
                    .transcript
                    .push(DisplayMessage::tool_indicator(ToolState::Pending));
                self.state = ReducerState::ToolPending { index };
            }
            // Back-to-back tool uses share one indicator.
            ReducerState::ToolPending { index } => {
                self.state = ReducerState::ToolPending { index };
            }
            ReducerState::Failed => self.state = ReducerState::Failed,
        }
        Ok(())
    }

    fn on_text(&mut self, data: String) -> Result<()> {
        match std::mem::replace(&mut self.state, ReducerState::Idle) {
            ReducerState::ToolPending { index } => {
                debug_assert_eq!(index + 1, self.transcript.len());
                if let Some(indicator) = self.transcript.open_mut() {
                    indicator.tool_state = ToolState::Completed;
                }
                debug!(index, "Tool use completed");
                self.transcript.push(DisplayMessage::assistant(data.clone()));
                self.state = ReducerState::Accumulating { buffer: data };
            }
            ReducerState::Idle => {
                self.ensure_placeholder()?;
                if let Some(open) = self.transcript.open_mut() {
                    open.content.clone_from(&data);
                }
                self.state = ReducerState::Accumulating { buffer: data };
            }
            ReducerState::Accumulating { mut buffer } => {
                buffer.push_str(&data);
                if let Some(open) = self.transcript.open_mut() {
                    open.content.clone_from(&buffer);
                }
                self.state = ReducerState::Accumulating { buffer };
            }
            ReducerState::Failed => self.state = ReducerState::Failed,
        }
        Ok(())
    }

    /// In `Idle`, the open message must be an empty assistant placeholder.
    fn ensure_placeholder(&mut self) -> Result<()> {
        if self.transcript.last().is_some_and(|m| m.is_placeholder()) {
            return Ok(());
        }
        let found = match self.transcript.last() {
            None => "an empty transcript".to_string(),
            Some(m) if m.role == Role::User => "a user message".to_string(),
            Some(m) => format!("an assistant message in state {:?}", m.tool_state),
        };
        self.violation(&format!("expected an open assistant placeholder, found {found}"))?;
        self.transcript.push(DisplayMessage::placeholder());
        Ok(())
    }

    fn violation(&self, what: &str) -> Result<()> {
        match self.strictness {
            Strictness::Strict => Err(RelayError::Protocol(what.to_string())),
            Strictness::Lenient => {
                warn!(what, "Reducer protocol violation; recovering");
                Ok(())
            }
        }
    }
}
