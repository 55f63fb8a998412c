//! Installation into the user's home directory
//!
//! `install` puts the binary in `~/.local/bin`, seeds the config directory
//! with a default `config.toml` and build recipe, and adds the bin directory
//! to the PATH of the shells it finds. `uninstall` reverses the first two.

use crate::error::fs_err;
use crate::{CoreError, Result};
use std::path::{Path, PathBuf};
use tiny42_config::{WorkspaceConfig, RECIPE_FILE_NAME};

/// Build recipe written on install
pub const DEFAULT_RECIPE: &str = include_str!("../assets/Dockerfile");

const BINARY_NAME: &str = "tiny42";
const CONFIG_FILE_NAME: &str = "config.toml";
const SHELL_RC_FILES: &[&str] = &[".zshrc", ".bashrc"];

/// What `Installer::install` did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub binary: PathBuf,
    /// The running executable already was the installed binary
    pub binary_in_place: bool,
    /// Config file written; `None` when one already existed
    pub config_written: Option<PathBuf>,
    /// Recipe written; `None` when one already existed
    pub recipe_written: Option<PathBuf>,
    /// Shell rc files a PATH export was appended to
    pub rc_updated: Vec<PathBuf>,
}

/// What `Installer::uninstall` removed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UninstallReport {
    pub removed: Vec<PathBuf>,
}

/// Installs and uninstalls tiny42 for the current user
#[derive(Debug, Clone)]
pub struct Installer {
    home: PathBuf,
    config_dir: PathBuf,
}

impl Installer {
    pub fn from_env() -> Result<Self> {
        let home = dirs::home_dir().ok_or(CoreError::MissingEnv("HOME"))?;
        let config_dir = WorkspaceConfig::config_dir()?;
        Ok(Self::with_paths(home, config_dir))
    }

    pub fn with_paths(home: impl Into<PathBuf>, config_dir: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            config_dir: config_dir.into(),
        }
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.home.join(".local").join("bin")
    }

    pub fn binary_path(&self) -> PathBuf {
        self.bin_dir().join(BINARY_NAME)
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Install `executable` and seed the config directory
    pub fn install(&self, executable: &Path) -> Result<InstallReport> {
        let bin_dir = self.bin_dir();
        std::fs::create_dir_all(&bin_dir).map_err(fs_err(&bin_dir))?;
        std::fs::create_dir_all(&self.config_dir).map_err(fs_err(&self.config_dir))?;

        let binary = self.binary_path();
        let binary_in_place = same_file(executable, &binary);
        if binary_in_place {
            tracing::debug!("{} is already installed", binary.display());
        } else {
            // Unlink first so a running copy of the old binary is not overwritten in place
            if binary.exists() {
                std::fs::remove_file(&binary).map_err(fs_err(&binary))?;
            }
            std::fs::copy(executable, &binary).map_err(fs_err(&binary))?;
            make_executable(&binary)?;
            tracing::info!("Installed {}", binary.display());
        }

        let config_path = self.config_dir.join(CONFIG_FILE_NAME);
        let config_written = if config_path.exists() {
            None
        } else {
            WorkspaceConfig::default().save_to(&config_path)?;
            Some(config_path)
        };

        let recipe_path = self.config_dir.join(RECIPE_FILE_NAME);
        let recipe_written = if recipe_path.exists() {
            None
        } else {
            std::fs::write(&recipe_path, DEFAULT_RECIPE).map_err(fs_err(&recipe_path))?;
            Some(recipe_path)
        };

        let mut rc_updated = Vec::new();
        for rc in SHELL_RC_FILES {
            let rc = self.home.join(rc);
            if add_to_path(&rc, &bin_dir)? {
                tracing::info!("Added {} to PATH in {}", bin_dir.display(), rc.display());
                rc_updated.push(rc);
            }
        }

        Ok(InstallReport {
            binary,
            binary_in_place,
            config_written,
            recipe_written,
            rc_updated,
        })
    }

    /// Remove the binary and the config directory. Shell rc files are left alone.
    pub fn uninstall(&self) -> Result<UninstallReport> {
        let mut removed = Vec::new();

        let binary = self.binary_path();
        if std::fs::symlink_metadata(&binary).is_ok() {
            std::fs::remove_file(&binary).map_err(fs_err(&binary))?;
            removed.push(binary);
        }

        if self.config_dir.exists() {
            std::fs::remove_dir_all(&self.config_dir).map_err(fs_err(&self.config_dir))?;
            removed.push(self.config_dir.clone());
        }

        Ok(UninstallReport { removed })
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).map_err(fs_err(path))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

/// Append a PATH export to an existing rc file that does not mention `bin_dir` yet
fn add_to_path(rc: &Path, bin_dir: &Path) -> Result<bool> {
    if !rc.is_file() {
        return Ok(false);
    }
    let content = std::fs::read_to_string(rc).map_err(fs_err(rc))?;
    let bin = bin_dir.display().to_string();
    if content.contains(&bin) {
        return Ok(false);
    }

    let mut updated = content;
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    updated.push_str(&format!("\nexport PATH=\"$PATH:{}\"\n", bin));
    std::fs::write(rc, updated).map_err(fs_err(rc))?;
    Ok(true)
}
