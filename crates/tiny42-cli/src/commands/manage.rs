//! Setup commands: goinfre relocation, install, uninstall, help

use anyhow::Result;
use std::path::Path;
use tiny42_config::{paint, Tone, WorkspaceConfig};
use tiny42_core::{Installer, StorageRelocation};

use super::confirm;

/// Move Docker's storage to goinfre
pub fn goinfre(relocation: &StorageRelocation) -> Result<()> {
    let reset = relocation.already_relocated()
        && confirm(
            &format!(
                "Docker is already setup in {}, do you want to reset it?",
                relocation.destination().display()
            ),
            false,
        )?;

    let report = relocation.relocate(|_| reset)?;
    for entry in &report.entries {
        tracing::debug!("{} -> {}", entry.link.display(), entry.target.display());
    }
    println!(
        "{}",
        paint(
            Tone::Success,
            format!("docker is now set up in {}", report.destination.display())
        )
    );
    Ok(())
}

/// Install `executable` for the current user
pub fn install(installer: &Installer, executable: &Path) -> Result<()> {
    let report = installer.install(executable)?;

    if let Some(config) = &report.config_written {
        println!("Created default config at {}", config.display());
    }
    if let Some(recipe) = &report.recipe_written {
        println!("Created default Dockerfile at {}", recipe.display());
    }
    println!(
        "{}",
        paint(
            Tone::Success,
            format!("tiny42 has been successfully installed to {}", report.binary.display())
        )
    );
    if !report.rc_updated.is_empty() {
        println!(
            "{}",
            paint(
                Tone::Guide,
                "Please restart your terminal or run 'source ~/.zshrc' (or ~/.bashrc) to use tiny42."
            )
        );
    }
    Ok(())
}

/// Remove the installed binary and config directory
pub fn uninstall(installer: &Installer) -> Result<()> {
    let report = installer.uninstall()?;
    for path in &report.removed {
        println!("Removed {}", path.display());
    }
    println!(
        "{}",
        paint(Tone::Success, "tiny42 has been successfully uninstalled!")
    );
    println!(
        "{}",
        paint(
            Tone::Guide,
            "Note: The PATH entry in your shell RC files was not removed. You may want to remove it manually if no longer needed."
        )
    );
    Ok(())
}

/// Fixed part of the usage text
const COMMANDS: &str = "\
Usage:
  tiny42 [command] [args...]

Commands:
  tiny42 <command>       Execute command inside the tiny42 container
  --init, -i             Initialize the tiny42 container
  --reload, -r           Rebuild and restart the tiny42 container
  --open-docker, -o      Start Docker daemon if not running
  --goinfre-docker, -g   Setup Docker in goinfre directory (42 School specific)
  --install              Install tiny42 into ~/.local/bin
  --uninstall            Remove tiny42 and its configuration
  --config <path>        Use another config file (env TINY42_CONFIG)
  --verbose, -v          Show debug logs
  --version, -V          Print version
  --help, -h             Show this help message
";

/// Usage text, including the active workspace and config locations
pub fn usage(config: &WorkspaceConfig, config_path: &Path) -> String {
    let mut out = format!(
        "tiny42 - A Docker-based development environment manager\n\n\
         Keep coding with your portable 42\n\n\
         Configuration:\n  \
         Workspace:  {}\n  \
         Settings:   {}\n  \
         Dockerfile: {}\n\n",
        config.workspace.display(),
        config_path.display(),
        config.recipe_path().display()
    );
    out.push_str(COMMANDS);

    if let Some(mapping) = config.port_mapping() {
        out.push_str(&format!(
            "\nPort Publishing:\n  Host port {} -> Container port {}\n",
            mapping.host, mapping.container
        ));
    }
    out
}

/// Print the usage text
pub fn help(config: &WorkspaceConfig, config_path: &Path) {
    print!("{}", paint(Tone::Guide, usage(config, config_path)));
}
