//! The managed container and the runtime requests derived from the config

use tiny42_config::WorkspaceConfig;
use tiny42_runtime::{BuildSpec, ExecSpec, MountSpec, PortSpec, RunSpec};

/// The single container tiny42 manages, as described by the configuration
#[derive(Debug, Clone, Copy)]
pub struct ManagedContainer<'a> {
    config: &'a WorkspaceConfig,
}

impl<'a> ManagedContainer<'a> {
    pub fn new(config: &'a WorkspaceConfig) -> Self {
        Self { config }
    }

    pub fn name(&self) -> &'a str {
        &self.config.container.name
    }

    pub fn image(&self) -> &'a str {
        &self.config.container.image
    }

    /// Get the image build request
    pub fn build_spec(&self) -> BuildSpec {
        BuildSpec {
            recipe: self.config.recipe_path().to_path_buf(),
            context: self.config.context_path().to_path_buf(),
            tag: self.config.container.image.clone(),
        }
    }

    /// Get the create-and-start request.
    ///
    /// The workspace is always bind-mounted at the mount point; at most one
    /// port is published, and only when publishing is enabled.
    pub fn run_spec(&self) -> RunSpec {
        let ports = self
            .config
            .port_mapping()
            .map(|m| PortSpec {
                host: m.host,
                container: m.container,
            })
            .into_iter()
            .collect();

        RunSpec {
            name: self.config.container.name.clone(),
            image: self.config.container.image.clone(),
            mounts: vec![MountSpec {
                source: self.config.workspace.clone(),
                target: self.config.container.mount_point.clone(),
            }],
            ports,
        }
    }

    /// Get the exec request for a shell command in `working_dir`
    pub fn exec_spec(&self, working_dir: String, command: String, tty: bool) -> ExecSpec {
        ExecSpec {
            container: self.config.container.name.clone(),
            shell: self.config.container.shell.clone(),
            working_dir,
            command,
            tty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_run_spec_without_port_publishing() {
        let config = WorkspaceConfig::for_workspace("/home/student/Projects");
        let spec = ManagedContainer::new(&config).run_spec();
        assert!(spec.ports.is_empty());
        assert_eq!(spec.name, "tiny42");
        assert_eq!(
            spec.mounts,
            vec![MountSpec {
                source: PathBuf::from("/home/student/Projects"),
                target: "/tiny42_workspace".to_string(),
            }]
        );
    }

    #[test]
    fn test_run_spec_with_port_publishing() {
        let mut config = WorkspaceConfig::for_workspace("/w");
        config.port_publishing.enabled = true;
        config.port_publishing.host = 4242;
        config.port_publishing.container = 80;
        let spec = ManagedContainer::new(&config).run_spec();
        assert_eq!(
            spec.ports,
            vec![PortSpec {
                host: 4242,
                container: 80
            }]
        );
    }

    #[test]
    fn test_build_spec_uses_recipe() {
        let mut config = WorkspaceConfig::for_workspace("/w");
        config.build.recipe = Some(PathBuf::from("/cfg/Dockerfile"));
        config.build.context = Some(PathBuf::from("/cfg"));
        let spec = ManagedContainer::new(&config).build_spec();
        assert_eq!(spec.recipe, PathBuf::from("/cfg/Dockerfile"));
        assert_eq!(spec.context, PathBuf::from("/cfg"));
        assert_eq!(spec.tag, "tiny42");
    }

    #[test]
    fn test_exec_spec_uses_shell() {
        let mut config = WorkspaceConfig::for_workspace("/w");
        config.container.shell = "zsh".to_string();
        let spec = ManagedContainer::new(&config).exec_spec(
            "/tiny42_workspace".to_string(),
            "ls".to_string(),
            false,
        );
        assert_eq!(spec.shell, "zsh");
        assert_eq!(spec.container, "tiny42");
        assert!(!spec.tty);
    }
}
