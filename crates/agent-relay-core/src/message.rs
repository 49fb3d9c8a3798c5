use serde::{Deserialize, Serialize};

/// Who authored a display message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// Tool indicator carried by a display message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolState {
    #[default]
    None,
    Pending,
    Completed,
}

/// One entry of a rendered transcript.
///
/// Messages with a tool state other than [`ToolState::None`] are indicators
/// and always carry empty content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayMessage {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub tool_state: ToolState,
}

impl DisplayMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_state: ToolState::None,
        }
    }

    /// Empty assistant message shown while waiting for output.
    pub fn placeholder() -> Self {
        Self::assistant("")
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_state: ToolState::None,
        }
    }

    pub fn tool_indicator(state: ToolState) -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            tool_state: state,
        }
    }

    pub fn is_tool_indicator(&self) -> bool {
        self.tool_state != ToolState::None
    }

    pub fn is_placeholder(&self) -> bool {
        self.role == Role::Assistant && self.tool_state == ToolState::None && self.content.is_empty()
    }
}
