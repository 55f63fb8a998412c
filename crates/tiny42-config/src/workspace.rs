//! Workspace configuration for tiny42
//!
//! Located at `~/.config/tiny42/config.toml`. Loaded once at startup and
//! handed to every component by reference; nothing mutates it afterwards.

use crate::{ConfigError, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name of the build recipe shipped next to the config file
pub const RECIPE_FILE_NAME: &str = "Dockerfile";

/// Top-level tiny42 configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Host directory that contains all projects. `~` and `$VAR` are expanded on load.
    pub workspace: PathBuf,
    /// Echo the translated directory and command before running it
    pub echo_on_startup: bool,
    pub port_publishing: PortPublishingConfig,
    pub container: ContainerConfig,
    pub runtime: RuntimeConfig,
    pub build: BuildConfig,
    pub relay: RelayConfig,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            workspace: PathBuf::from("~/Projects"),
            echo_on_startup: true,
            port_publishing: PortPublishingConfig::default(),
            container: ContainerConfig::default(),
            runtime: RuntimeConfig::default(),
            build: BuildConfig::default(),
            relay: RelayConfig::default(),
        }
    }
}

/// Optional `-p HOST:CONTAINER` publishing for the managed container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortPublishingConfig {
    pub enabled: bool,
    /// Port on the host machine
    pub host: u16,
    /// Port inside the container
    pub container: u16,
}

impl Default for PortPublishingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: 8080,
            container: 8080,
        }
    }
}

/// A single host to container port mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMapping {
    pub host: u16,
    pub container: u16,
}

impl std::fmt::Display for PortMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.container)
    }
}

/// Identity of the managed container and image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Container name
    pub name: String,
    /// Image tag built from the recipe
    pub image: String,
    /// Where the workspace is bind-mounted inside the container
    pub mount_point: String,
    /// Shell used to run relayed commands
    pub shell: String,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            name: "tiny42".to_string(),
            image: "tiny42".to_string(),
            mount_point: "/tiny42_workspace".to_string(),
            shell: "bash".to_string(),
        }
    }
}

/// Container runtime settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Runtime CLI ("docker" or "podman")
    pub command: String,
    /// Command that launches the runtime daemon. Empty disables launching.
    pub daemon_launch: Vec<String>,
    /// Maximum wait for the daemon after launching it, 0 waits forever
    pub daemon_timeout_secs: u64,
    /// Delay between daemon liveness probes
    pub poll_interval_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            command: "docker".to_string(),
            daemon_launch: default_daemon_launch(),
            daemon_timeout_secs: 120,
            poll_interval_ms: 1000,
        }
    }
}

#[cfg(target_os = "macos")]
fn default_daemon_launch() -> Vec<String> {
    ["open", "-g", "-a", "Docker"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[cfg(not(target_os = "macos"))]
fn default_daemon_launch() -> Vec<String> {
    ["systemctl", "--user", "start", "docker"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Image build settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Build recipe. Defaults to `Dockerfile` next to the config file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipe: Option<PathBuf>,
    /// Build context. Defaults to the recipe's directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<PathBuf>,
}

/// Command relay settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Shell-quote each argument instead of joining them verbatim
    pub quote_arguments: bool,
}

impl WorkspaceConfig {
    /// Defaults with an already-resolved workspace, for callers that skip the file
    pub fn for_workspace(workspace: impl Into<PathBuf>) -> Self {
        let mut config = Self {
            workspace: workspace.into(),
            ..Self::default()
        };
        config.build.recipe = Some(PathBuf::from(RECIPE_FILE_NAME));
        config.build.context = Some(PathBuf::from("."));
        config
    }

    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load configuration from a specific path, falling back to defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
                path: path.to_path_buf(),
                source: e,
            })?;
            let config: Self =
                toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
                    path: path.to_path_buf(),
                    source: e,
                })?;
            tracing::debug!("Loaded config from {:?}", path);
            config
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            Self::default()
        };

        let config_dir = path.parent().unwrap_or(Path::new("."));
        let home = dirs::home_dir();
        config.resolve(home.as_deref(), config_dir)
    }

    /// Expand paths, fill in path defaults and validate.
    ///
    /// `config_dir` is where the recipe is looked up when none is configured.
    pub fn resolve(mut self, home: Option<&Path>, config_dir: &Path) -> Result<Self> {
        self.workspace = expand_path(&self.workspace, home)?;
        if !self.workspace.is_absolute() {
            return Err(ConfigError::RelativeWorkspace(
                self.workspace.display().to_string(),
            ));
        }

        let recipe = match self.build.recipe.take() {
            Some(recipe) => expand_path(&recipe, home)?,
            None => config_dir.join(RECIPE_FILE_NAME),
        };
        let context = match self.build.context.take() {
            Some(context) => expand_path(&context, home)?,
            None => recipe
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        };
        self.build.recipe = Some(recipe);
        self.build.context = Some(context);

        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        if self.container.name.trim().is_empty() {
            return Err(ConfigError::Invalid("container.name is empty".to_string()));
        }
        if self.container.image.trim().is_empty() {
            return Err(ConfigError::Invalid("container.image is empty".to_string()));
        }
        if !self.container.mount_point.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "container.mount_point must be absolute, got \"{}\"",
                self.container.mount_point
            )));
        }
        if self.runtime.command.trim().is_empty() {
            return Err(ConfigError::Invalid("runtime.command is empty".to_string()));
        }
        if self.runtime.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "runtime.poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Get the tiny42 config directory
    pub fn config_dir() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "tiny42").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().to_path_buf())
    }

    /// Port mapping, if publishing is enabled
    pub fn port_mapping(&self) -> Option<PortMapping> {
        self.port_publishing.enabled.then_some(PortMapping {
            host: self.port_publishing.host,
            container: self.port_publishing.container,
        })
    }

    pub fn recipe_path(&self) -> &Path {
        self.build
            .recipe
            .as_deref()
            .unwrap_or(Path::new(RECIPE_FILE_NAME))
    }

    pub fn context_path(&self) -> &Path {
        self.build.context.as_deref().unwrap_or(Path::new("."))
    }

    /// Upper bound on the daemon wait; `None` means no bound
    pub fn daemon_timeout(&self) -> Option<Duration> {
        match self.runtime.daemon_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.runtime.poll_interval_ms)
    }
}

/// Expand `~` and environment variables in a path
fn expand_path(path: &Path, home: Option<&Path>) -> Result<PathBuf> {
    let raw = path.to_string_lossy();
    let expanded = shellexpand::full_with_context(
        raw.as_ref(),
        || home.map(|h| h.to_string_lossy().into_owned()),
        |var: &str| match std::env::var(var) {
            Ok(value) => Ok(Some(value)),
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(e) => Err(e),
        },
    )
    .map_err(|e| ConfigError::Expansion {
        path: raw.to_string(),
        reason: e.to_string(),
    })?;
    Ok(PathBuf::from(expanded.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WorkspaceConfig::default();
        assert_eq!(config.container.name, "tiny42");
        assert_eq!(config.container.mount_point, "/tiny42_workspace");
        assert_eq!(config.runtime.command, "docker");
        assert!(config.port_mapping().is_none());
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
workspace = "/home/student/Projects/42berlin"
echo_on_startup = false

[port_publishing]
enabled = true
host = 3000
container = 80

[container]
name = "dorker"
mount_point = "/dorker_workspace"

[runtime]
command = "podman"
daemon_timeout_secs = 0
"#;

        let config: WorkspaceConfig = toml::from_str(toml).unwrap();
        assert_eq!(
            config.workspace,
            PathBuf::from("/home/student/Projects/42berlin")
        );
        assert!(!config.echo_on_startup);
        assert_eq!(
            config.port_mapping(),
            Some(PortMapping {
                host: 3000,
                container: 80
            })
        );
        assert_eq!(config.container.name, "dorker");
        // Unset fields keep their defaults
        assert_eq!(config.container.image, "tiny42");
        assert_eq!(config.container.shell, "bash");
        assert_eq!(config.runtime.command, "podman");
        assert_eq!(config.daemon_timeout(), None);
    }

    #[test]
    fn test_resolve_expands_home() {
        let config = WorkspaceConfig::default()
            .resolve(Some(Path::new("/home/student")), Path::new("/etc/tiny42"))
            .unwrap();
        assert_eq!(config.workspace, PathBuf::from("/home/student/Projects"));
        assert_eq!(config.recipe_path(), Path::new("/etc/tiny42/Dockerfile"));
        assert_eq!(config.context_path(), Path::new("/etc/tiny42"));
    }

    #[test]
    fn test_resolve_rejects_relative_workspace() {
        let config = WorkspaceConfig {
            workspace: PathBuf::from("Projects"),
            ..Default::default()
        };
        let err = config
            .resolve(Some(Path::new("/home/student")), Path::new("/etc/tiny42"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::RelativeWorkspace(_)));
    }

    #[test]
    fn test_resolve_rejects_relative_mount_point() {
        let mut config = WorkspaceConfig::for_workspace("/w");
        config.container.mount_point = "workspace".to_string();
        let err = config
            .resolve(None, Path::new("/etc/tiny42"))
            .unwrap_err();
        assert!(err.to_string().contains("mount_point"));
    }

    #[test]
    fn test_explicit_recipe_and_context_are_kept() {
        let mut config = WorkspaceConfig::for_workspace("/w");
        config.build.recipe = Some(PathBuf::from("~/images/Dockerfile.dev"));
        config.build.context = Some(PathBuf::from("/srv/ctx"));
        let config = config
            .resolve(Some(Path::new("/home/student")), Path::new("/etc/tiny42"))
            .unwrap();
        assert_eq!(
            config.recipe_path(),
            Path::new("/home/student/images/Dockerfile.dev")
        );
        assert_eq!(config.context_path(), Path::new("/srv/ctx"));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        let config = WorkspaceConfig::load_from(&path).unwrap();
        assert_eq!(config.container.name, "tiny42");
        assert_eq!(config.recipe_path(), tmp.path().join("Dockerfile"));
    }

    #[test]
    fn test_load_invalid_toml() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "workspace = [").unwrap();
        let err = WorkspaceConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TomlParseError { .. }));
    }

    #[test]
    fn test_save_and_reload() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("config.toml");
        let mut config = WorkspaceConfig::default();
        config.workspace = tmp.path().to_path_buf();
        config.port_publishing.enabled = true;
        config.save_to(&path).unwrap();

        let loaded = WorkspaceConfig::load_from(&path).unwrap();
        assert_eq!(loaded.workspace, tmp.path());
        assert!(loaded.port_mapping().is_some());
    }

    #[test]
    fn test_port_mapping_display() {
        let mapping = PortMapping {
            host: 8080,
            container: 80,
        };
        assert_eq!(mapping.to_string(), "8080:80");
    }
}
