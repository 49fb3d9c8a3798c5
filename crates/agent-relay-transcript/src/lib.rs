//! Client-side transcript reconstruction.
//!
//! [`decode_frames`] turns the relay's wire frames back into
//! [`NormalizedEvent`]s, and a [`Turn`] folds them into a [`Transcript`],
//! inferring tool completion from the first text that follows a tool use.

pub mod decode;
pub mod driver;
pub mod reducer;
pub mod transcript;

pub use agent_relay_core::{DisplayMessage, NormalizedEvent, Role, ToolState};
pub use decode::decode_frames;
pub use driver::{Conversation, TurnOutcome, run_turn};
pub use reducer::{ReducerState, Strictness, Turn};
pub use transcript::Transcript;
