//! Configuration for tiny42
//!
//! This crate handles:
//! - The workspace configuration (`~/.config/tiny42/config.toml`)
//! - The terminal palette used for user-facing messages

mod error;
mod palette;
mod workspace;

pub use error::*;
pub use palette::*;
pub use workspace::*;
