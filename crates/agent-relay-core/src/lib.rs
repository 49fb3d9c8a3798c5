//! Core types, wire codec, config, and errors for agent-relay.

pub mod config;
pub mod error;
pub mod event;
pub mod lines;
pub mod message;
pub mod session;

pub use error::{RelayError, Result};
pub use event::{NormalizedEvent, WireFrame};
pub use message::{DisplayMessage, Role, ToolState};
