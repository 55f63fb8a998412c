//! CLI command implementations

mod lifecycle;
mod manage;

pub use lifecycle::*;
pub use manage::*;

use dialoguer::{theme::ColorfulTheme, Confirm};
use std::io::IsTerminal;

/// Ask a yes/no question. Without a terminal the default answer is used.
pub(crate) fn confirm(prompt: &str, default: bool) -> anyhow::Result<bool> {
    if !std::io::stdin().is_terminal() {
        tracing::debug!("Non-interactive session, answering \"{}\" with {}", prompt, default);
        return Ok(default);
    }

    Ok(Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(default)
        .interact()?)
}
