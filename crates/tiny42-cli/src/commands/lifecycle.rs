//! Container commands: relay, init, reload, open-docker

use anyhow::Result;
use std::path::Path;
use tiny42_config::{paint, Tone, WorkspaceConfig};
use tiny42_core::{
    CancellationToken, CommandRelay, DaemonStatus, Lifecycle, LifecycleAction, RelayOutcome,
    StorageRelocation,
};
use tiny42_runtime::RuntimeClient;

use super::{confirm, goinfre};

/// Relay `args` into the container from `cwd`.
///
/// Returns the command's exit code, or `None` when the arguments ask for
/// help instead.
pub async fn run(
    runtime: &dyn RuntimeClient,
    config: &WorkspaceConfig,
    args: &[String],
    cwd: &Path,
    cancel: &CancellationToken,
) -> Result<Option<i32>> {
    let relay = CommandRelay::new(Lifecycle::new(runtime, config));

    let Some(invocation) = relay.prepare(args, cwd)? else {
        return Ok(None);
    };

    if config.echo_on_startup {
        eprintln!(
            "{}",
            paint(
                Tone::Guide,
                format!("{} $ {}", invocation.container_dir, invocation.command)
            )
        );
    }

    match relay.run(invocation, cancel).await? {
        RelayOutcome::Exited { ready, code, .. } => {
            if ready != LifecycleAction::AlreadyRunning {
                tracing::debug!("Container was prepared before relaying: {:?}", ready);
            }
            Ok(Some(code))
        }
        RelayOutcome::Help => Ok(None),
    }
}

/// Build, create and start the container.
///
/// With `relocation`, the user is first offered to move Docker's storage.
pub async fn init(
    runtime: &dyn RuntimeClient,
    config: &WorkspaceConfig,
    cancel: &CancellationToken,
    relocation: Option<&StorageRelocation>,
) -> Result<()> {
    if let Some(relocation) = relocation {
        if confirm(
            "tiny42 wants to know if you want to setup Docker inside goinfre. Do you want to setup Docker within goinfre?",
            false,
        )? {
            goinfre(relocation)?;
        }
    }

    let action = Lifecycle::new(runtime, config).init(cancel).await?;
    let message = match action {
        LifecycleAction::AlreadyRunning => "tiny42 is already running in",
        LifecycleAction::Started => "tiny42 is started in",
        LifecycleAction::Created | LifecycleAction::BuiltAndCreated => "tiny42 is running in",
    };
    println!(
        "{}",
        paint(
            Tone::Success,
            format!("{} {}", message, config.workspace.display())
        )
    );
    Ok(())
}

/// Rebuild the image and recreate the container
pub async fn reload(
    runtime: &dyn RuntimeClient,
    config: &WorkspaceConfig,
    cancel: &CancellationToken,
) -> Result<()> {
    Lifecycle::new(runtime, config).reload(cancel).await?;
    println!(
        "{}",
        paint(Tone::Success, "tiny42 is reloaded and restarted")
    );
    Ok(())
}

/// Start the runtime daemon if it is not running
pub async fn open_docker(
    runtime: &dyn RuntimeClient,
    config: &WorkspaceConfig,
    cancel: &CancellationToken,
) -> Result<()> {
    let kind = runtime.info().kind;
    match Lifecycle::new(runtime, config).ensure_daemon(cancel).await? {
        DaemonStatus::AlreadyRunning => {
            println!("{}", paint(Tone::Guide, format!("{} is already running", kind)))
        }
        DaemonStatus::Launched => {
            println!("{}", paint(Tone::Success, format!("{} is up and running", kind)))
        }
    }
    Ok(())
}
