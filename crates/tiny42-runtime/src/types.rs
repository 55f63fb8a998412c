//! Common types for the container runtime client

use std::path::PathBuf;

/// Container ID wrapper
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerId(pub String);

impl ContainerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(12) {
            Some((end, _)) => &self.0[..end],
            None => &self.0,
        }
    }
}

impl std::fmt::Display for ContainerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Container runtime flavor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeKind {
    Docker,
    Podman,
}

impl std::fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Docker => write!(f, "docker"),
            Self::Podman => write!(f, "podman"),
        }
    }
}

impl std::str::FromStr for RuntimeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "docker" => Ok(Self::Docker),
            "podman" => Ok(Self::Podman),
            _ => Err(format!("Unknown runtime: {}", s)),
        }
    }
}

/// Whether the managed container exists and runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerPresence {
    Absent,
    Stopped,
    Running,
}

impl ContainerPresence {
    /// Map a runtime `State` column to a presence.
    ///
    /// Anything other than `running` counts as stopped: created, exited,
    /// paused and dead containers all need a `start`.
    pub fn from_state(state: &str) -> Self {
        if state.trim().eq_ignore_ascii_case("running") {
            Self::Running
        } else {
            Self::Stopped
        }
    }
}

impl std::fmt::Display for ContainerPresence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Absent => write!(f, "absent"),
            Self::Stopped => write!(f, "stopped"),
            Self::Running => write!(f, "running"),
        }
    }
}

/// Image build request
#[derive(Debug, Clone)]
pub struct BuildSpec {
    /// Build recipe (Dockerfile) path
    pub recipe: PathBuf,
    /// Build context directory
    pub context: PathBuf,
    /// Image tag
    pub tag: String,
}

/// Bind mount of a host directory into the container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountSpec {
    pub source: PathBuf,
    pub target: String,
}

/// Published port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortSpec {
    pub host: u16,
    pub container: u16,
}

/// Create-and-start request for the managed container
#[derive(Debug, Clone)]
pub struct RunSpec {
    pub name: String,
    pub image: String,
    pub mounts: Vec<MountSpec>,
    pub ports: Vec<PortSpec>,
}

/// Interactive exec request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecSpec {
    /// Container name
    pub container: String,
    /// Shell that interprets `command`
    pub shell: String,
    /// Working directory inside the container
    pub working_dir: String,
    /// Shell command string
    pub command: String,
    /// Allocate a TTY
    pub tty: bool,
}

/// Runtime information
#[derive(Debug, Clone)]
pub struct RuntimeInfo {
    pub kind: RuntimeKind,
    /// CLI binary used for every invocation
    pub command: String,
}
