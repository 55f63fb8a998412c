//! Error types for the container runtime client

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Container runtime '{0}' was not found in PATH")]
    NotInstalled(String),

    #[error("`{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Failed to build image {0}")]
    BuildFailed(String),

    #[error("Unexpected runtime output: {0}")]
    Parse(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
