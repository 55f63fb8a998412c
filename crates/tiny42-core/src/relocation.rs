//! Move the container runtime's per-user storage to goinfre
//!
//! On 42 school machines the home directory has a small quota while
//! `/goinfre/$USER` is large local scratch space. Docker Desktop's state
//! directories are replaced by symlinks into that scratch space.

use crate::error::fs_err;
use crate::{CoreError, Result};
use std::path::{Path, PathBuf};

/// Default scratch storage root on 42 machines
pub const GOINFRE_ROOT: &str = "/goinfre";

/// State directories, as (name under the destination, link path relative to home)
const RELOCATED_ENTRIES: &[(&str, &str)] = &[
    ("com.docker.docker", "Library/Containers/com.docker.docker"),
    ("com.docker.helper", "Library/Containers/com.docker.helper"),
    (".docker", ".docker"),
];

/// One relocated directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocatedEntry {
    pub link: PathBuf,
    pub target: PathBuf,
    /// Something already existed at `link` and was removed
    pub replaced: bool,
}

/// What `StorageRelocation::relocate` did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocationReport {
    pub destination: PathBuf,
    /// The destination existed and its contents were wiped
    pub reset: bool,
    pub entries: Vec<RelocatedEntry>,
}

/// Relocates Docker's state directories into `<storage_root>/<user>/docker`
#[derive(Debug, Clone)]
pub struct StorageRelocation {
    home: PathBuf,
    user: String,
    storage_root: PathBuf,
}

impl StorageRelocation {
    /// Build from `USER` and the home directory, targeting `/goinfre`
    pub fn from_env() -> Result<Self> {
        let user = std::env::var("USER")
            .ok()
            .filter(|u| !u.is_empty())
            .ok_or(CoreError::MissingEnv("USER"))?;
        let home = dirs::home_dir().ok_or(CoreError::MissingEnv("HOME"))?;
        Ok(Self::with_paths(home, user, GOINFRE_ROOT))
    }

    pub fn with_paths(
        home: impl Into<PathBuf>,
        user: impl Into<String>,
        storage_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            home: home.into(),
            user: user.into(),
            storage_root: storage_root.into(),
        }
    }

    /// `<storage_root>/<user>/docker`
    pub fn destination(&self) -> PathBuf {
        self.storage_root.join(&self.user).join("docker")
    }

    /// Whether a previous relocation left a destination behind
    pub fn already_relocated(&self) -> bool {
        self.destination().exists()
    }

    /// Relocate the state directories.
    ///
    /// `confirm_reset` is asked only when the destination already exists;
    /// answering yes wipes the relocated directories before linking again.
    pub fn relocate(&self, confirm_reset: impl FnOnce(&Path) -> bool) -> Result<RelocationReport> {
        let destination = self.destination();

        let mut reset = false;
        if destination.exists() && confirm_reset(&destination) {
            for (name, _) in RELOCATED_ENTRIES {
                remove_path(&destination.join(name))?;
            }
            reset = true;
            tracing::info!("Reset {}", destination.display());
        }

        let mut entries = Vec::with_capacity(RELOCATED_ENTRIES.len());
        for (name, link) in RELOCATED_ENTRIES {
            let target = destination.join(name);
            let link = self.home.join(link);

            let replaced = remove_path(&link)?;
            std::fs::create_dir_all(&target).map_err(fs_err(&target))?;
            if let Some(parent) = link.parent() {
                std::fs::create_dir_all(parent).map_err(fs_err(parent))?;
            }
            symlink_dir(&target, &link)?;
            tracing::debug!("Linked {} -> {}", link.display(), target.display());

            entries.push(RelocatedEntry {
                link,
                target,
                replaced,
            });
        }

        Ok(RelocationReport {
            destination,
            reset,
            entries,
        })
    }
}

/// Remove a symlink, file or directory tree. Returns whether anything was there.
fn remove_path(path: &Path) -> Result<bool> {
    let meta = match std::fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(fs_err(path)(e)),
    };
    if meta.is_dir() {
        std::fs::remove_dir_all(path).map_err(fs_err(path))?;
    } else {
        std::fs::remove_file(path).map_err(fs_err(path))?;
    }
    Ok(true)
}

#[cfg(unix)]
fn symlink_dir(target: &Path, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, link).map_err(fs_err(link))
}

#[cfg(not(unix))]
fn symlink_dir(_target: &Path, _link: &Path) -> Result<()> {
    Err(CoreError::Unsupported(
        "storage relocation needs symlinks and is only available on unix".to_string(),
    ))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, StorageRelocation) {
        let tmp = TempDir::new().unwrap();
        let home = tmp.path().join("home");
        let goinfre = tmp.path().join("goinfre");
        std::fs::create_dir_all(&home).unwrap();
        std::fs::create_dir_all(&goinfre).unwrap();
        let relocation = StorageRelocation::with_paths(home, "marvin", goinfre);
        (tmp, relocation)
    }

    #[test]
    fn test_destination() {
        let relocation = StorageRelocation::with_paths("/Users/marvin", "marvin", "/goinfre");
        assert_eq!(
            relocation.destination(),
            PathBuf::from("/goinfre/marvin/docker")
        );
    }

    #[test]
    fn test_relocate_fresh_home() {
        let (tmp, relocation) = setup();
        let mut asked = false;

        let report = relocation
            .relocate(|_| {
                asked = true;
                true
            })
            .unwrap();

        assert!(!asked);
        assert!(!report.reset);
        assert_eq!(report.entries.len(), 3);
        for entry in &report.entries {
            assert!(!entry.replaced);
            assert!(entry.target.is_dir());
            assert_eq!(std::fs::read_link(&entry.link).unwrap(), entry.target);
        }
        assert!(tmp
            .path()
            .join("home/Library/Containers/com.docker.docker")
            .is_symlink());
        assert!(tmp.path().join("home/.docker").is_symlink());
    }

    #[test]
    fn test_relocate_replaces_existing_directories() {
        let (tmp, relocation) = setup();
        let docker_dir = tmp.path().join("home/.docker");
        std::fs::create_dir_all(&docker_dir).unwrap();
        std::fs::write(docker_dir.join("config.json"), "{}").unwrap();

        let report = relocation.relocate(|_| false).unwrap();

        let entry = report
            .entries
            .iter()
            .find(|e| e.link == docker_dir)
            .unwrap();
        assert!(entry.replaced);
        assert!(docker_dir.is_symlink());
        assert!(!docker_dir.join("config.json").exists());
    }

    #[test]
    fn test_relocate_again_keeps_data_when_declined() {
        let (_tmp, relocation) = setup();
        relocation.relocate(|_| false).unwrap();
        let marker = relocation.destination().join(".docker/config.json");
        std::fs::write(&marker, "{}").unwrap();

        let mut asked_for = None;
        let report = relocation
            .relocate(|dest| {
                asked_for = Some(dest.to_path_buf());
                false
            })
            .unwrap();

        assert_eq!(asked_for, Some(relocation.destination()));
        assert!(!report.reset);
        assert!(marker.exists());
        assert!(report.entries.iter().all(|e| e.replaced));
    }

    #[test]
    fn test_relocate_again_wipes_data_when_confirmed() {
        let (_tmp, relocation) = setup();
        relocation.relocate(|_| false).unwrap();
        let marker = relocation.destination().join(".docker/config.json");
        std::fs::write(&marker, "{}").unwrap();

        let report = relocation.relocate(|_| true).unwrap();

        assert!(report.reset);
        assert!(!marker.exists());
        assert!(relocation.destination().join(".docker").is_dir());
    }
}
