//! Incremental terminal rendering of a transcript.

use std::io::{self, Write};

use agent_relay_transcript::{DisplayMessage, Role, ToolState};

const TOOL_RUNNING: &str = "[tool running]";
const TOOL_DONE: &str = " done";

/// Prints only what changed since the previous update.
///
/// Relies on the transcript being append-only: earlier messages only ever
/// change their tool state, and only the open message grows.
pub struct LiveRenderer<W: Write> {
    out: W,
    /// Per message: last rendered tool state and bytes of content written.
    seen: Vec<(ToolState, usize)>,
}

impl<W: Write> LiveRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            seen: Vec::new(),
        }
    }

    pub fn update(&mut self, messages: &[DisplayMessage]) -> io::Result<()> {
        for (i, message) in messages.iter().enumerate() {
            if i == self.seen.len() {
                if i > 0 {
                    writeln!(self.out)?;
                }
                if message.role == Role::User {
                    write!(self.out, "> ")?;
                }
                self.seen.push((ToolState::None, 0));
            }

            let (state, written) = &mut self.seen[i];
            if *state != message.tool_state {
                match (*state, message.tool_state) {
                    (ToolState::None, ToolState::Pending) => write!(self.out, "{TOOL_RUNNING}")?,
                    (ToolState::Pending, ToolState::Completed) => write!(self.out, "{TOOL_DONE}")?,
                    (ToolState::None, ToolState::Completed) => {
                        write!(self.out, "{TOOL_RUNNING}{TOOL_DONE}")?
                    }
                    _ => {}
                }
                *state = message.tool_state;
            }

            if let Some(new) = message.content.get(*written..).filter(|s| !s.is_empty()) {
                write!(self.out, "{new}")?;
                *written = message.content.len();
            }
        }
        self.out.flush()
    }

    /// End the output with a newline.
    pub fn finish(mut self) -> io::Result<W> {
        if !self.seen.is_empty() {
            writeln!(self.out)?;
        }
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Render a complete transcript in one pass.
pub fn render(messages: &[DisplayMessage]) -> String {
    let mut renderer = LiveRenderer::new(Vec::new());
    let rendered = renderer
        .update(messages)
        .and_then(|()| renderer.finish())
        .unwrap_or_default();
    String::from_utf8_lossy(&rendered).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_tool_then_text() {
        let messages = vec![
            DisplayMessage::user("weather?"),
            DisplayMessage::tool_indicator(ToolState::Completed),
            DisplayMessage::assistant("Sunny"),
        ];
        assert_eq!(render(&messages), "> weather?\n[tool running] done\nSunny\n");
    }

    #[test]
    fn test_incremental_updates_print_only_changes() {
        let mut renderer = LiveRenderer::new(Vec::new());
        let mut messages = vec![DisplayMessage::user("q"), DisplayMessage::placeholder()];
        renderer.update(&messages).unwrap();

        messages[1] = DisplayMessage::tool_indicator(ToolState::Pending);
        renderer.update(&messages).unwrap();

        messages[1].tool_state = ToolState::Completed;
        messages.push(DisplayMessage::assistant("Hel"));
        renderer.update(&messages).unwrap();

        messages[2].content.push_str("lo");
        renderer.update(&messages).unwrap();

        let out = String::from_utf8(renderer.finish().unwrap()).unwrap();
        assert_eq!(out, "> q\n[tool running] done\nHello\n");
    }

    #[test]
    fn test_pending_tool_is_left_running() {
        let messages = vec![
            DisplayMessage::user("q"),
            DisplayMessage::assistant("Let me check."),
            DisplayMessage::tool_indicator(ToolState::Pending),
        ];
        assert_eq!(render(&messages), "> q\nLet me check.\n[tool running]\n");
    }
}
