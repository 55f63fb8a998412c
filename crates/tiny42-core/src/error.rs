//! Error types for tiny42-core

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(#[from] tiny42_config::ConfigError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] tiny42_runtime::RuntimeError),

    #[error(
        "You are not inside the workspace specified. tiny42 can only be run inside \"{}\" (current directory: \"{}\")",
        workspace.display(),
        cwd.display()
    )]
    OutsideWorkspace { cwd: PathBuf, workspace: PathBuf },

    #[error("Timed out after {0:?} waiting for the container runtime to start")]
    DaemonTimeout(Duration),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Environment variable {0} is not set")]
    MissingEnv(&'static str),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("I/O error at {}: {source}", path.display())]
    Fs {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// Attach a path to an I/O error
pub(crate) fn fs_err(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> CoreError {
    let path = path.into();
    move |source| CoreError::Fs { path, source }
}
