//! Terminal colors for user-facing messages

use crossterm::style::{style, Color, StyledContent, Stylize};

/// The role a message plays, which decides its color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    /// Something completed (green)
    Success,
    /// Instructions and usage text (cyan)
    Guide,
    /// Errors and warnings (red)
    Error,
}

impl Tone {
    pub fn color(self) -> Color {
        match self {
            Self::Success => Color::DarkGreen,
            Self::Guide => Color::DarkCyan,
            Self::Error => Color::DarkRed,
        }
    }
}

/// Style `text` with the color for `tone`
pub fn paint<D: std::fmt::Display>(tone: Tone, text: D) -> StyledContent<D> {
    style(text).with(tone.color())
}
