//! Streaming package download with throttled progress.
//!
//! The response body is copied through a bounded buffer into a temporary file
//! beside the destination. Only a fully received body is persisted under the
//! destination name; any failure drops the temporary file and removes a stale
//! destination left by an earlier attempt, so later stages never see a
//! half-written archive.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use tempfile::NamedTempFile;

use crate::http::{HttpTransport, Timeouts, TransportError};

/// Read buffer used while streaming the body.
const DOWNLOAD_BUFFER_SIZE: usize = 64 * 1024;

/// Default minimum spacing between progress callbacks.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(120);

/// Snapshot of download progress passed to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    /// Bytes written so far.
    pub downloaded: u64,
    /// Total size, when the server advertised one.
    pub total: Option<u64>,
}

impl DownloadProgress {
    /// Completion as a whole percentage, when the total is known.
    #[must_use]
    pub fn percent(&self) -> Option<u64> {
        match self.total {
            Some(0) | None => None,
            Some(total) => Some(self.downloaded.saturating_mul(100) / total),
        }
    }
}

/// Rate limiter for progress callbacks.
///
/// The first sample is always emitted, later samples only once `interval`
/// has elapsed since the previous emission.
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    interval: Duration,
    last_emit: Option<Instant>,
}

impl ProgressThrottle {
    /// Create a throttle with the given minimum spacing.
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emit: None,
        }
    }

    /// Decide whether a sample taken at `now` should be emitted.
    pub fn should_emit(&mut self, now: Instant) -> bool {
        let due = self
            .last_emit
            .is_none_or(|last| now.saturating_duration_since(last) >= self.interval);
        if due {
            self.last_emit = Some(now);
        }
        due
    }
}

/// A package archive whose body was fully received.
///
/// The digest has not been checked yet; see
/// [`IntegrityVerifier`](crate::digest::IntegrityVerifier).
#[derive(Debug)]
pub struct DownloadedArtifact {
    path: PathBuf,
    size: u64,
}

impl DownloadedArtifact {
    /// Wrap an already complete file.
    #[must_use]
    pub fn sealed(path: PathBuf, size: u64) -> Self {
        Self { path, size }
    }

    /// Location of the archive.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of bytes received.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Delete the archive from disk, ignoring a file that is already gone.
    pub fn discard(self) {
        remove_if_present(&self.path);
    }
}

/// Errors arising while downloading a package.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// No response was received.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server answered with a non-success status.
    #[error("download of {url} returned HTTP {status}")]
    Status {
        /// The URL that was requested.
        url: String,
        /// The status code received.
        status: u16,
    },

    /// The body ended before the advertised length was received.
    #[error("download truncated: received {received} of {expected} bytes")]
    Truncated {
        /// Bytes actually written.
        received: u64,
        /// Bytes announced by `Content-Length`.
        expected: u64,
    },

    /// Reading the body or writing the file failed.
    #[error("I/O error during download: {0}")]
    Io(#[from] io::Error),
}

/// Streams release archives to local storage.
pub struct PackageDownloader<'a> {
    transport: &'a dyn HttpTransport,
    timeouts: Timeouts,
    progress_interval: Duration,
}

impl<'a> PackageDownloader<'a> {
    /// Create a downloader using `transport` with the given timeouts.
    #[must_use]
    pub fn new(transport: &'a dyn HttpTransport, timeouts: Timeouts) -> Self {
        Self {
            transport,
            timeouts,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    /// Override the minimum spacing between progress callbacks.
    #[must_use]
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Download `url` into `destination`, reporting progress to `on_progress`.
    ///
    /// The destination is replaced on every attempt. On failure nothing is
    /// left under the destination name.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] on transport failure, non-2xx status, short
    /// body, or any I/O error.
    pub fn download(
        &self,
        url: &str,
        destination: &Path,
        on_progress: &mut dyn FnMut(DownloadProgress),
    ) -> Result<DownloadedArtifact, DownloadError> {
        let result = self.try_download(url, destination, on_progress);
        if let Err(e) = &result {
            warn!("download of {url} failed: {e}");
            remove_if_present(destination);
        }
        result
    }

    fn try_download(
        &self,
        url: &str,
        destination: &Path,
        on_progress: &mut dyn FnMut(DownloadProgress),
    ) -> Result<DownloadedArtifact, DownloadError> {
        let parent = destination
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;

        debug!("requesting package from {url}");
        let response = self.transport.get(url, self.timeouts)?;
        if !response.is_success() {
            return Err(DownloadError::Status {
                url: url.to_owned(),
                status: response.status,
            });
        }
        let total = response.content_length;
        match total {
            Some(bytes) => info!("downloading {bytes} bytes from {url}"),
            None => info!("downloading from {url} (size unknown)"),
        }

        let mut staged = NamedTempFile::new_in(parent)?;
        let mut body = response.body;
        let downloaded = self.stream_body(&mut body, staged.as_file_mut(), total, on_progress)?;

        if let Some(expected) = total.filter(|&expected| expected != downloaded) {
            return Err(DownloadError::Truncated {
                received: downloaded,
                expected,
            });
        }

        staged.as_file().sync_all()?;
        remove_if_present(destination);
        staged
            .persist(destination)
            .map_err(|e| DownloadError::Io(e.error))?;
        debug!("package sealed at {}", destination.display());
        Ok(DownloadedArtifact::sealed(destination.to_path_buf(), downloaded))
    }

    fn stream_body(
        &self,
        body: &mut dyn Read,
        file: &mut fs::File,
        total: Option<u64>,
        on_progress: &mut dyn FnMut(DownloadProgress),
    ) -> Result<u64, DownloadError> {
        let mut buffer = vec![0u8; DOWNLOAD_BUFFER_SIZE];
        let mut throttle = ProgressThrottle::new(self.progress_interval);
        let mut downloaded = 0u64;

        loop {
            let bytes_read = match body.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(DownloadError::Io(e)),
            };
            let chunk = buffer.get(..bytes_read).unwrap_or_default();
            file.write_all(chunk)?;
            downloaded = downloaded.saturating_add(u64::try_from(bytes_read).unwrap_or(u64::MAX));

            if throttle.should_emit(Instant::now()) {
                on_progress(DownloadProgress { downloaded, total });
            }
        }
        file.flush()?;
        on_progress(DownloadProgress { downloaded, total });
        Ok(downloaded)
    }
}

fn remove_if_present(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!("removed {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("could not remove {}: {e}", path.display()),
    }
}

#[cfg(test)]
#[path = "download_tests.rs"]
mod tests;
