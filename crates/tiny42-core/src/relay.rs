//! Command relay: run a host command inside the managed container
//!
//! The caller's directory relative to the workspace is replayed under the
//! container's mount point, so `/W/sub/dir` on the host becomes
//! `<mount>/sub/dir` inside the container.

use crate::{CoreError, Lifecycle, LifecycleAction, ManagedContainer, Result};
use std::io::IsTerminal;
use std::path::{Component, Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// A command ready to be relayed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    /// Arguments as given on the command line
    pub raw_args: Vec<String>,
    /// Host directory relative to the workspace root (empty at the root)
    pub relative_path: PathBuf,
    /// Working directory inside the container
    pub container_dir: String,
    /// Shell command string handed to the container shell
    pub command: String,
}

/// Result of `CommandRelay::execute`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// No command or a help flag; the runtime was not touched
    Help,
    /// The command ran with this exit code
    Exited {
        invocation: CommandInvocation,
        ready: LifecycleAction,
        code: i32,
    },
}

/// Whether arguments request the usage text instead of a command
pub fn wants_help(args: &[String]) -> bool {
    match args.first() {
        None => true,
        Some(first) => first == "-h" || first == "--help",
    }
}

/// Resolve `.` and `..` without touching the filesystem
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Path of `cwd` relative to `workspace`.
///
/// `cwd` must be the workspace itself or a descendant of it. The comparison
/// is per path component, so `/W-other` is not inside `/W`.
pub fn relative_to_workspace(cwd: &Path, workspace: &Path) -> Option<PathBuf> {
    normalize(cwd)
        .strip_prefix(normalize(workspace))
        .ok()
        .map(Path::to_path_buf)
}

/// Container directory for a workspace-relative path
pub fn container_dir(mount_point: &str, relative: &Path) -> String {
    let mut dir = mount_point.trim_end_matches('/').to_string();
    for component in relative.components() {
        if let Component::Normal(part) = component {
            dir.push('/');
            dir.push_str(&part.to_string_lossy());
        }
    }
    if dir.is_empty() {
        dir.push('/');
    }
    dir
}

/// Build the shell command string.
///
/// Joined verbatim with single spaces, so shell syntax in the arguments
/// (pipes, globs, `&&`) is interpreted inside the container. With `quote`
/// every argument is passed literally instead.
pub fn join_command(args: &[String], quote: bool) -> String {
    if quote {
        shell_words::join(args)
    } else {
        args.join(" ")
    }
}

/// Relays commands into the managed container
pub struct CommandRelay<'a> {
    lifecycle: Lifecycle<'a>,
}

impl<'a> CommandRelay<'a> {
    pub fn new(lifecycle: Lifecycle<'a>) -> Self {
        Self { lifecycle }
    }

    /// Validate the workspace and translate the command, without touching the runtime.
    ///
    /// Returns `Ok(None)` when the arguments ask for help.
    pub fn prepare(&self, args: &[String], cwd: &Path) -> Result<Option<CommandInvocation>> {
        if wants_help(args) {
            return Ok(None);
        }

        let config = self.lifecycle.config();
        let relative = relative_to_workspace(cwd, &config.workspace)
            .or_else(|| {
                // The shell may report a symlink-resolved cwd
                let canonical = std::fs::canonicalize(&config.workspace).ok()?;
                relative_to_workspace(cwd, &canonical)
            })
            .ok_or_else(|| CoreError::OutsideWorkspace {
                cwd: cwd.to_path_buf(),
                workspace: config.workspace.clone(),
            })?;

        Ok(Some(CommandInvocation {
            raw_args: args.to_vec(),
            container_dir: container_dir(&config.container.mount_point, &relative),
            relative_path: relative,
            command: join_command(args, config.relay.quote_arguments),
        }))
    }

    /// Make sure the container is ready, then run the invocation in it
    pub async fn run(
        &self,
        invocation: CommandInvocation,
        cancel: &CancellationToken,
    ) -> Result<RelayOutcome> {
        let ready = self.lifecycle.guarantee_ready(cancel).await?;

        let spec = ManagedContainer::new(self.lifecycle.config()).exec_spec(
            invocation.container_dir.clone(),
            invocation.command.clone(),
            std::io::stdin().is_terminal(),
        );
        tracing::debug!(
            "Relaying `{}` to {}:{}",
            spec.command,
            spec.container,
            spec.working_dir
        );
        let code = self.lifecycle.runtime().exec_interactive(&spec).await?;

        Ok(RelayOutcome::Exited {
            invocation,
            ready,
            code,
        })
    }

    /// Run `args` inside the container from the host directory `cwd`
    pub async fn execute(
        &self,
        args: &[String],
        cwd: &Path,
        cancel: &CancellationToken,
    ) -> Result<RelayOutcome> {
        match self.prepare(args, cwd)? {
            None => Ok(RelayOutcome::Help),
            Some(invocation) => self.run(invocation, cancel).await,
        }
    }
}
