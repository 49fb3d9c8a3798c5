//! Drive a turn from an event stream.

use futures::Stream;
use tokio_stream::StreamExt;
use tracing::{debug, info};

use agent_relay_core::{DisplayMessage, NormalizedEvent};

use crate::reducer::{ReducerState, Strictness, Turn};
use crate::transcript::Transcript;

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The event stream ended normally.
    Completed { events: usize },
    /// The stream failed; a failure notice was appended.
    Failed { events: usize, error: String },
}

impl TurnOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, TurnOutcome::Failed { .. })
    }
}

/// Run one turn: append `prompt`, fold every event into `transcript`, and
/// call `on_update` with the transcript after each change.
pub async fn run_turn<S, F>(
    transcript: &mut Transcript,
    prompt: &str,
    events: S,
    strictness: Strictness,
    mut on_update: F,
) -> TurnOutcome
where
    S: Stream<Item = anyhow::Result<NormalizedEvent>>,
    F: FnMut(&[DisplayMessage]),
{
    let mut turn = Turn::begin(transcript, prompt).with_strictness(strictness);
    on_update(turn.transcript().messages());
    info!(prompt_len = prompt.len(), "Turn started");

    let mut events = std::pin::pin!(events);
    let mut applied = 0;

    while let Some(item) = events.next().await {
        let result = match item {
            Ok(event) => turn.apply(event).map_err(anyhow::Error::from),
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            let error = format!("{e:#}");
            turn.fail(&error);
            on_update(turn.transcript().messages());
            info!(events = applied, "Turn failed");
            return TurnOutcome::Failed {
                events: applied,
                error,
            };
        }

        applied += 1;
        on_update(turn.transcript().messages());
    }

    if let ReducerState::ToolPending { index } = turn.state() {
        debug!(index, "Turn ended with a tool still pending");
    }
    info!(events = applied, "Turn completed");
    TurnOutcome::Completed { events: applied }
}

/// A transcript plus the settings used for each of its turns.
#[derive(Debug, Default)]
pub struct Conversation {
    transcript: Transcript,
    strictness: Strictness,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strictness(strictness: Strictness) -> Self {
        Self {
            transcript: Transcript::new(),
            strictness,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub async fn run_turn<S, F>(&mut self, prompt: &str, events: S, on_update: F) -> TurnOutcome
    where
        S: Stream<Item = anyhow::Result<NormalizedEvent>>,
        F: FnMut(&[DisplayMessage]),
    {
        run_turn(&mut self.transcript, prompt, events, self.strictness, on_update).await
    }
}
