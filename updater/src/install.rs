//! Flattening package installation.
//!
//! Release archives carry a drop-in file set (client binary, resources) in
//! whatever directory layout the build tool produced. Installation keeps only
//! each entry's base name: `build/libs/app-all.jar` lands as `app-all.jar`.
//! The first entry with a given base name wins and later duplicates are
//! skipped.
//!
//! Entries are first streamed into a staging directory beside the target, on
//! the same filesystem. Files are renamed into the live directory only after
//! every entry has been fully written, and an archive without files never
//! touches the target at all.
//!
//! Files being replaced are moved aside into a backup directory first. If any
//! move fails, the new files are removed and the backups restored, so the
//! live directory holds either the old set or the complete new one.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

/// Trait for installing a verified archive, enabling test mocking.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use wsmr_updater::install::{PackageInstaller, ZipInstaller};
///
/// let installer = ZipInstaller::default();
/// let installed = installer.install(Path::new("client-latest.zip"), Path::new("app"))?;
/// println!("installed {} files", installed.files().len());
/// # Ok::<(), wsmr_updater::install::InstallError>(())
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait PackageInstaller {
    /// Install the archive at `archive` into `target_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::EmptyPackage`] when no file was extracted,
    /// [`InstallError::Archive`] for unreadable archives,
    /// [`InstallError::Blocked`] when a destination is not a regular file, and
    /// [`InstallError::Io`] on filesystem failures. On error the target
    /// directory holds the files it held before.
    fn install(&self, archive: &Path, target_dir: &Path) -> Result<InstalledPackage, InstallError>;
}

/// Errors arising from package installation.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    /// The archive held no installable files.
    #[error("package was empty")]
    EmptyPackage,

    /// The archive could not be read as ZIP.
    #[error("invalid package archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// A destination name is taken by something other than a regular file.
    #[error("cannot replace {}: not a regular file", .path.display())]
    Blocked {
        /// The occupied destination.
        path: PathBuf,
    },

    /// I/O error while staging or moving files.
    #[error("install I/O error: {0}")]
    Io(#[from] io::Error),
}

/// The files written to the live install directory.
///
/// Always holds at least one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPackage {
    target_dir: PathBuf,
    files: Vec<String>,
    skipped_duplicates: Vec<String>,
}

impl InstalledPackage {
    /// Build a package record, refusing an empty file list.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::EmptyPackage`] when `files` is empty.
    pub fn new(
        target_dir: PathBuf,
        files: Vec<String>,
        skipped_duplicates: Vec<String>,
    ) -> Result<Self, InstallError> {
        if files.is_empty() {
            return Err(InstallError::EmptyPackage);
        }
        Ok(Self {
            target_dir,
            files,
            skipped_duplicates,
        })
    }

    /// Directory the files were installed into.
    #[must_use]
    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    /// Base names installed, in archive order.
    #[must_use]
    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// Archive entries dropped because their base name was already taken.
    #[must_use]
    pub fn skipped_duplicates(&self) -> &[String] {
        &self.skipped_duplicates
    }
}

/// ZIP installer that flattens entries and stages them before moving.
#[derive(Debug, Clone, Default)]
pub struct ZipInstaller {
    executable_extensions: Vec<String>,
}

impl ZipInstaller {
    /// Mark installed files with one of `extensions` as executable on Unix.
    #[must_use]
    pub fn with_executable_extensions(extensions: &[String]) -> Self {
        Self {
            executable_extensions: extensions.to_vec(),
        }
    }

    fn stage_entries(
        archive: &mut zip::ZipArchive<File>,
        staging: &Path,
    ) -> Result<(Vec<String>, Vec<String>), InstallError> {
        let mut seen = HashSet::new();
        let mut files = Vec::new();
        let mut skipped = Vec::new();

        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;
            if entry.is_dir() {
                continue;
            }
            let entry_name = entry.name().to_owned();
            let Some(base) = flattened_name(&entry_name) else {
                debug!("skipping entry without a usable file name: {entry_name}");
                continue;
            };
            if !seen.insert(duplicate_key(base, CASE_INSENSITIVE_FS)) {
                info!("skipping duplicate package entry {entry_name} ({base} already staged)");
                skipped.push(entry_name);
                continue;
            }

            let staged_path = staging.join(base);
            let mut out = File::create(&staged_path)?;
            io::copy(&mut entry, &mut out)?;
            out.sync_all()?;
            debug!("staged {entry_name} as {base}");
            files.push(base.to_owned());
        }
        Ok((files, skipped))
    }

    fn is_executable(&self, name: &str) -> bool {
        Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.executable_extensions
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            })
    }
}

impl PackageInstaller for ZipInstaller {
    fn install(&self, archive: &Path, target_dir: &Path) -> Result<InstalledPackage, InstallError> {
        let mut zip = zip::ZipArchive::new(File::open(archive)?)?;

        let staging_parent = target_dir
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(staging_parent)?;
        let staging = tempfile::Builder::new()
            .prefix(".wsmr-staging-")
            .tempdir_in(staging_parent)?;

        let (files, skipped) = Self::stage_entries(&mut zip, staging.path())?;
        if files.is_empty() {
            warn!("package {} contained no files", archive.display());
            return Err(InstallError::EmptyPackage);
        }

        ensure_replaceable(target_dir, &files)?;
        fs::create_dir_all(target_dir)?;
        let backup = tempfile::Builder::new()
            .prefix(".wsmr-backup-")
            .tempdir_in(staging_parent)?;
        let mut swap = Swap::new(target_dir, backup.path());
        for name in &files {
            let placed = swap.replace(&staging.path().join(name), name).and_then(|destination| {
                if self.is_executable(name) {
                    set_executable(&destination)?;
                }
                Ok(destination)
            });
            match placed {
                Ok(destination) => info!("installed {}", destination.display()),
                Err(e) => {
                    warn!("installing {name} failed ({e}); restoring previous files");
                    swap.roll_back();
                    return Err(e.into());
                }
            }
        }

        InstalledPackage::new(target_dir.to_path_buf(), files, skipped)
    }
}

/// Return the last path segment of an archive entry name.
///
/// Both `/` and `\` separate segments. Blank names and the `.`/`..`
/// pseudo-entries yield `None`.
#[must_use]
pub fn flattened_name(entry_name: &str) -> Option<&str> {
    let base = entry_name.rsplit(['/', '\\']).next()?.trim();
    match base {
        "" | "." | ".." => None,
        name => Some(name),
    }
}

#[cfg(any(windows, target_os = "macos"))]
const CASE_INSENSITIVE_FS: bool = true;
#[cfg(not(any(windows, target_os = "macos")))]
const CASE_INSENSITIVE_FS: bool = false;

/// Key under which a base name counts as already staged.
fn duplicate_key(base: &str, case_insensitive: bool) -> String {
    if case_insensitive {
        base.to_lowercase()
    } else {
        base.to_owned()
    }
}

/// Refuse to start when a destination is occupied by a non-file.
fn ensure_replaceable(target_dir: &Path, names: &[String]) -> Result<(), InstallError> {
    for name in names {
        let destination = target_dir.join(name);
        match fs::symlink_metadata(&destination) {
            Ok(meta) if !meta.is_file() => {
                return Err(InstallError::Blocked { path: destination });
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Replaces files in the live directory, keeping what it displaced.
struct Swap<'a> {
    target_dir: &'a Path,
    backup_dir: &'a Path,
    backed_up: Vec<String>,
    placed: Vec<String>,
}

impl<'a> Swap<'a> {
    fn new(target_dir: &'a Path, backup_dir: &'a Path) -> Self {
        Self {
            target_dir,
            backup_dir,
            backed_up: Vec::new(),
            placed: Vec::new(),
        }
    }

    /// Move `staged` to `<target_dir>/<name>`, backing up any existing file.
    fn replace(&mut self, staged: &Path, name: &str) -> io::Result<PathBuf> {
        let destination = self.target_dir.join(name);
        if fs::symlink_metadata(&destination).is_ok() {
            fs::rename(&destination, self.backup_dir.join(name))?;
            self.backed_up.push(name.to_owned());
        }
        self.placed.push(name.to_owned());
        move_into_place(staged, &destination)?;
        Ok(destination)
    }

    /// Remove everything placed so far and restore the backups.
    fn roll_back(self) {
        for name in self.placed.iter().rev() {
            let path = self.target_dir.join(name);
            if let Err(e) = fs::remove_file(&path) {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!("could not remove {}: {e}", path.display());
                }
            }
        }
        for name in self.backed_up.iter().rev() {
            let path = self.target_dir.join(name);
            if let Err(e) = fs::rename(self.backup_dir.join(name), &path) {
                warn!("could not restore {}: {e}", path.display());
            }
        }
    }
}

fn move_into_place(staged: &Path, destination: &Path) -> io::Result<()> {
    match fs::rename(staged, destination) {
        Ok(()) => Ok(()),
        Err(rename_error) => {
            debug!(
                "rename to {} failed ({rename_error}); copying instead",
                destination.display()
            );
            fs::copy(staged, destination)?;
            fs::remove_file(staged)
        }
    }
}

#[cfg(unix)]
fn set_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_mode(permissions.mode() | 0o755);
    fs::set_permissions(path, permissions)
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
#[path = "install_tests.rs"]
mod tests;
