//! Directory resolution abstraction for platform-specific paths.
//!
//! The pipeline never hard-codes where it caches downloads or where the live
//! client lives; it asks a [`BaseDirs`] implementation. Production code uses
//! [`SystemBaseDirs`], which follows the platform conventions via
//! `directories-next`.

use std::path::PathBuf;

use directories_next::ProjectDirs;

/// Name of the application directory under the platform data directory.
const INSTALL_SUBDIR: &str = "app";

/// Provides the directories the updater reads and writes.
#[cfg_attr(test, mockall::automock)]
pub trait BaseDirs {
    /// Directory for the cached descriptor and downloaded archive.
    fn cache_dir(&self) -> Option<PathBuf>;

    /// Directory holding the live client installation.
    fn install_dir(&self) -> Option<PathBuf>;
}

/// Resolves directories using the platform conventions.
///
/// # Examples
///
/// ```no_run
/// use wsmr_updater::dirs::{BaseDirs, SystemBaseDirs};
///
/// let dirs = SystemBaseDirs;
/// if let Some(cache) = dirs.cache_dir() {
///     println!("cache: {}", cache.display());
/// }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBaseDirs;

impl SystemBaseDirs {
    fn project() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", "WSMR")
    }
}

impl BaseDirs for SystemBaseDirs {
    fn cache_dir(&self) -> Option<PathBuf> {
        Self::project().map(|dirs| dirs.cache_dir().to_path_buf())
    }

    fn install_dir(&self) -> Option<PathBuf> {
        Self::project().map(|dirs| dirs.data_local_dir().join(INSTALL_SUBDIR))
    }
}

/// Fixed directories, for callers that already know where things live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedDirs {
    /// Cache directory.
    pub cache: PathBuf,
    /// Install directory.
    pub install: PathBuf,
}

impl BaseDirs for FixedDirs {
    fn cache_dir(&self) -> Option<PathBuf> {
        Some(self.cache.clone())
    }

    fn install_dir(&self) -> Option<PathBuf> {
        Some(self.install.clone())
    }
}
