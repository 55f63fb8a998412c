//! Container runtime client for tiny42
//!
//! This crate wraps the container runtime CLI (Docker or Podman) behind the
//! [`RuntimeClient`] trait so the lifecycle logic can be exercised against a
//! fake runtime.

mod cli;
mod error;
mod types;

pub use cli::*;
pub use error::*;
pub use types::*;

use async_trait::async_trait;
use tiny42_config::WorkspaceConfig;

/// Operations tiny42 needs from a container runtime
#[async_trait]
pub trait RuntimeClient: Send + Sync {
    /// Check whether the runtime daemon answers
    async fn daemon_running(&self) -> Result<bool>;

    /// Launch the runtime daemon without waiting for it
    async fn launch_daemon(&self) -> Result<()>;

    /// Look up a container by exact name
    async fn container_state(&self, name: &str) -> Result<ContainerPresence>;

    /// Check whether an image with this repository name exists locally
    async fn image_exists(&self, image: &str) -> Result<bool>;

    /// Build an image from a recipe
    async fn build(&self, spec: &BuildSpec) -> Result<()>;

    /// Create and start a detached container
    async fn run_detached(&self, spec: &RunSpec) -> Result<ContainerId>;

    /// Start a stopped container
    async fn start(&self, name: &str) -> Result<()>;

    /// Stop a running container
    async fn stop(&self, name: &str) -> Result<()>;

    /// Remove a container
    async fn remove(&self, name: &str) -> Result<()>;

    /// Run a command with the caller's stdio attached, returning its exit code
    async fn exec_interactive(&self, spec: &ExecSpec) -> Result<i32>;

    /// Get runtime information
    fn info(&self) -> RuntimeInfo;
}

/// Create the runtime client described by the configuration
pub fn create_runtime(config: &WorkspaceConfig) -> Box<dyn RuntimeClient> {
    let command = config.runtime.command.clone();
    let kind = runtime_kind_for(&command);
    tracing::debug!("Using {} runtime via `{}`", kind, command);
    Box::new(CliRuntime::new(
        command,
        kind,
        config.runtime.daemon_launch.clone(),
    ))
}

/// Guess the runtime flavor from the CLI binary name
fn runtime_kind_for(command: &str) -> RuntimeKind {
    let binary = std::path::Path::new(command)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| command.to_string());

    match binary.parse() {
        Ok(kind) => kind,
        Err(_) => {
            // Docker-compatible CLIs (nerdctl, colima wrappers) take docker flags
            tracing::warn!("Unknown runtime '{}', assuming docker-compatible CLI", binary);
            RuntimeKind::Docker
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_kind_for_paths() {
        assert_eq!(runtime_kind_for("docker"), RuntimeKind::Docker);
        assert_eq!(runtime_kind_for("/usr/bin/podman"), RuntimeKind::Podman);
        assert_eq!(runtime_kind_for("nerdctl"), RuntimeKind::Docker);
    }

    #[test]
    fn test_create_runtime_uses_configured_command() {
        let mut config = WorkspaceConfig::for_workspace("/w");
        config.runtime.command = "podman".to_string();
        let runtime = create_runtime(&config);
        let info = runtime.info();
        assert_eq!(info.kind, RuntimeKind::Podman);
        assert_eq!(info.command, "podman");
    }
}
