//! CLI-based runtime client for Docker and Podman
//!
//! Every operation is a single invocation of the runtime binary. Queries
//! capture output and parse it; build and exec inherit the terminal so the
//! user sees progress and can interact.

use crate::{
    BuildSpec, ContainerId, ContainerPresence, ExecSpec, Result, RunSpec, RuntimeClient,
    RuntimeError, RuntimeInfo, RuntimeKind,
};
use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;

/// CLI-based runtime client
pub struct CliRuntime {
    /// Binary to invoke ("docker", "podman" or a full path)
    cmd: String,
    kind: RuntimeKind,
    /// Command that launches the daemon
    daemon_launch: Vec<String>,
}

impl CliRuntime {
    pub fn new(cmd: impl Into<String>, kind: RuntimeKind, daemon_launch: Vec<String>) -> Self {
        Self {
            cmd: cmd.into(),
            kind,
            daemon_launch,
        }
    }

    /// Run a command and capture stdout
    async fn run_cmd(&self, args: &[String]) -> Result<String> {
        tracing::debug!("Running: {} {}", self.cmd, args.join(" "));

        let output = Command::new(&self.cmd)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RuntimeError::CommandFailed {
                command: self.describe(args),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Run a command attached to the caller's terminal
    async fn run_inherited(&self, args: &[String]) -> Result<ExitStatus> {
        tracing::debug!("Running (attached): {} {}", self.cmd, args.join(" "));

        Command::new(&self.cmd)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| self.spawn_error(e))
    }

    fn spawn_error(&self, e: std::io::Error) -> RuntimeError {
        if e.kind() == std::io::ErrorKind::NotFound {
            RuntimeError::NotInstalled(self.cmd.clone())
        } else {
            RuntimeError::Io(e)
        }
    }

    fn describe(&self, args: &[String]) -> String {
        let verb = args.first().map(String::as_str).unwrap_or_default();
        format!("{} {}", self.cmd, verb)
    }
}

/// Arguments for `build`
pub fn build_command_args(spec: &BuildSpec) -> Vec<String> {
    vec![
        "build".to_string(),
        "-t".to_string(),
        spec.tag.clone(),
        "-f".to_string(),
        spec.recipe.display().to_string(),
        spec.context.display().to_string(),
    ]
}

/// Arguments for `run`: detached, with stdin and a TTY kept open so the
/// container's shell stays alive.
pub fn run_command_args(spec: &RunSpec) -> Vec<String> {
    let mut args = vec!["run".to_string(), "-itd".to_string()];

    for port in &spec.ports {
        args.push("-p".to_string());
        args.push(format!("{}:{}", port.host, port.container));
    }

    for mount in &spec.mounts {
        args.push("-v".to_string());
        args.push(format!("{}:{}", mount.source.display(), mount.target));
    }

    args.push(format!("--name={}", spec.name));
    args.push(spec.image.clone());
    args
}

/// Arguments for an interactive `exec`
pub fn exec_command_args(spec: &ExecSpec) -> Vec<String> {
    let mut args = vec!["exec".to_string(), "-i".to_string()];
    if spec.tty {
        args.push("-t".to_string());
    }
    args.push(format!("--workdir={}", spec.working_dir));
    args.push(spec.container.clone());
    args.push(spec.shell.clone());
    args.push("-c".to_string());
    args.push(spec.command.clone());
    args
}

/// Parse `ps -a --format={{.Names}}|{{.State}}` output for an exact name.
///
/// Docker may list several comma-separated names per row and older engines
/// prefix them with `/`.
pub fn parse_container_rows(output: &str, name: &str) -> Result<ContainerPresence> {
    for line in output.lines().filter(|l| !l.trim().is_empty()) {
        let (names, state) = line
            .split_once('|')
            .ok_or_else(|| RuntimeError::Parse(format!("malformed ps row: {}", line)))?;

        let matches = names
            .split(',')
            .map(|n| n.trim().trim_start_matches('/'))
            .any(|n| n == name);
        if matches {
            return Ok(ContainerPresence::from_state(state));
        }
    }
    Ok(ContainerPresence::Absent)
}

/// Parse `images --format={{.Repository}}` output for a repository name.
///
/// Podman reports locally built images as `localhost/<name>`.
pub fn parse_image_rows(output: &str, image: &str) -> bool {
    let repository = image_repository(image);
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .any(|repo| repo == repository || repo == format!("localhost/{}", repository))
}

/// Exit code of a finished child, shell style: `128 + signal` when killed by a signal
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

/// Strip a `:tag` suffix, leaving registry ports alone
fn image_repository(image: &str) -> &str {
    match image.rfind(':') {
        Some(idx) if !image[idx..].contains('/') => &image[..idx],
        _ => image,
    }
}

#[async_trait]
impl RuntimeClient for CliRuntime {
    async fn daemon_running(&self) -> Result<bool> {
        tracing::debug!("Probing daemon: {} info", self.cmd);
        let status = Command::new(&self.cmd)
            .arg("info")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| self.spawn_error(e))?;
        Ok(status.success())
    }

    async fn launch_daemon(&self) -> Result<()> {
        let (program, args) = self.daemon_launch.split_first().ok_or_else(|| {
            RuntimeError::Unsupported(format!(
                "no daemon launch command configured for {}",
                self.kind
            ))
        })?;

        tracing::debug!("Launching daemon: {}", self.daemon_launch.join(" "));
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            return Err(RuntimeError::CommandFailed {
                command: self.daemon_launch.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    async fn container_state(&self, name: &str) -> Result<ContainerPresence> {
        let args = vec![
            "ps".to_string(),
            "-a".to_string(),
            format!("--filter=name={}", name),
            "--format={{.Names}}|{{.State}}".to_string(),
        ];
        let output = self.run_cmd(&args).await?;
        let presence = parse_container_rows(&output, name)?;
        tracing::debug!("Container {} is {}", name, presence);
        Ok(presence)
    }

    async fn image_exists(&self, image: &str) -> Result<bool> {
        let args = vec![
            "images".to_string(),
            format!("--filter=reference={}", image),
            "--format={{.Repository}}".to_string(),
        ];
        let output = self.run_cmd(&args).await?;
        Ok(parse_image_rows(&output, image))
    }

    async fn build(&self, spec: &BuildSpec) -> Result<()> {
        let status = self.run_inherited(&build_command_args(spec)).await?;
        if !status.success() {
            return Err(RuntimeError::BuildFailed(spec.tag.clone()));
        }
        Ok(())
    }

    async fn run_detached(&self, spec: &RunSpec) -> Result<ContainerId> {
        let output = self.run_cmd(&run_command_args(spec)).await?;
        let id = ContainerId::new(output.trim());
        tracing::debug!("Created container {} ({})", spec.name, id.short());
        Ok(id)
    }

    async fn start(&self, name: &str) -> Result<()> {
        self.run_cmd(&["start".to_string(), name.to_string()]).await?;
        Ok(())
    }

    async fn stop(&self, name: &str) -> Result<()> {
        self.run_cmd(&["stop".to_string(), name.to_string()]).await?;
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<()> {
        self.run_cmd(&["rm".to_string(), name.to_string()]).await?;
        Ok(())
    }

    async fn exec_interactive(&self, spec: &ExecSpec) -> Result<i32> {
        let status = self.run_inherited(&exec_command_args(spec)).await?;
        Ok(exit_code(status))
    }

    fn info(&self) -> RuntimeInfo {
        RuntimeInfo {
            kind: self.kind,
            command: self.cmd.clone(),
        }
    }
}
