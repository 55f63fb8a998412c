//! tiny42 - portable 42 development container

use clap::{ArgGroup, Parser};
use std::path::PathBuf;
use tiny42_cli::commands;
use tiny42_config::{paint, Tone, WorkspaceConfig};
use tiny42_core::{wants_help, CancellationToken, Installer, StorageRelocation, GOINFRE_ROOT};
use tiny42_runtime::create_runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "tiny42")]
#[command(version, about = "Keep coding with your portable 42", long_about = None)]
#[command(disable_help_flag = true)]
#[command(group(
    ArgGroup::new("action")
        .args(["init", "reload", "open_docker", "goinfre_docker", "install", "uninstall", "command"])
        .multiple(false)
))]
struct Cli {
    /// Initialize the tiny42 container
    #[arg(short, long)]
    init: bool,

    /// Rebuild and restart the tiny42 container
    #[arg(short, long)]
    reload: bool,

    /// Start the Docker daemon if not running
    #[arg(short, long)]
    open_docker: bool,

    /// Move Docker's storage to goinfre (42 School specific)
    #[arg(short, long)]
    goinfre_docker: bool,

    /// Install tiny42 into ~/.local/bin
    #[arg(long)]
    install: bool,

    /// Remove tiny42 and its configuration
    #[arg(long)]
    uninstall: bool,

    /// Show help
    #[arg(short = 'h', long = "help")]
    show_help: bool,

    /// Config file to use instead of the default
    #[arg(long, env = "TINY42_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Command to run inside the container
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
    command: Vec<String>,
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{}", paint(Tone::Error, format!("Error: {:#}", e)));
            std::process::exit(1);
        }
    }
}

async fn run() -> anyhow::Result<i32> {
    let cli = Cli::parse();

    // Logs go to stderr so they never mix with relayed output
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    // Setup commands don't need the workspace config
    if cli.install {
        let exe = std::env::current_exe()?;
        commands::install(&Installer::from_env()?, &exe)?;
        return Ok(0);
    }
    if cli.uninstall {
        commands::uninstall(&Installer::from_env()?)?;
        return Ok(0);
    }
    if cli.goinfre_docker {
        commands::goinfre(&StorageRelocation::from_env()?)?;
        return Ok(0);
    }

    let config_path = match cli.config {
        Some(path) => path,
        None => WorkspaceConfig::config_path()?,
    };
    let config = WorkspaceConfig::load_from(&config_path)?;

    let relaying = !(cli.init || cli.reload || cli.open_docker);
    if cli.show_help || (relaying && wants_help(&cli.command)) {
        commands::help(&config, &config_path);
        return Ok(0);
    }

    let runtime = create_runtime(&config);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("Interrupted");
            on_interrupt.cancel();
        }
    });

    if cli.init {
        let relocation = if std::path::Path::new(GOINFRE_ROOT).is_dir() {
            StorageRelocation::from_env().ok()
        } else {
            None
        };
        commands::init(runtime.as_ref(), &config, &cancel, relocation.as_ref()).await?;
        return Ok(0);
    }
    if cli.reload {
        commands::reload(runtime.as_ref(), &config, &cancel).await?;
        return Ok(0);
    }
    if cli.open_docker {
        commands::open_docker(runtime.as_ref(), &config, &cancel).await?;
        return Ok(0);
    }

    let cwd = std::env::current_dir()?;
    match commands::run(runtime.as_ref(), &config, &cli.command, &cwd, &cancel).await? {
        Some(code) => Ok(code),
        None => {
            commands::help(&config, &config_path);
            Ok(0)
        }
    }
}
