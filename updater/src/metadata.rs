//! Release descriptor retrieval.
//!
//! The descriptor is a small JSON document:
//!
//! ```json
//! {
//!   "latest_client_version": "1.0.1",
//!   "min_required_client_version": "1.0.0",
//!   "download_url": "https://example.test/client-1.0.1.zip",
//!   "sha256": "<64 hex characters>"
//! }
//! ```
//!
//! Unknown fields are ignored. The raw body is persisted to the cache before
//! parsing so it survives a parse failure. Every failure collapses into
//! [`MetadataOutcome::NotAvailable`]: a missing descriptor means "start
//! normally", never "stop".

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info};
use serde::Deserialize;

use crate::digest::{DigestParseError, Sha256Digest};
use crate::http::{HttpTransport, Timeouts, TransportError};

/// File name of the cached raw descriptor.
pub const METADATA_CACHE_FILENAME: &str = "app-version.json";

/// Upper bound on the descriptor body.
const MAX_METADATA_BYTES: u64 = 1024 * 1024;

/// Where the installable package lives and how to check it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageLocation {
    /// URL of the ZIP archive.
    pub download_url: String,
    /// SHA-256 published for the archive.
    pub expected_digest: Sha256Digest,
}

/// Parsed release descriptor.
///
/// A package URL can only exist together with its digest; a descriptor that
/// offers an archive without a trust anchor never parses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseMetadata {
    latest_version: String,
    min_required_version: String,
    package: Option<PackageLocation>,
    digest_without_package: Option<Sha256Digest>,
}

impl ReleaseMetadata {
    /// Newest published client version.
    #[must_use]
    pub fn latest_version(&self) -> &str {
        &self.latest_version
    }

    /// Oldest client version still allowed to run.
    #[must_use]
    pub fn min_required_version(&self) -> &str {
        &self.min_required_version
    }

    /// The installable package, when one is published.
    #[must_use]
    pub fn package(&self) -> Option<&PackageLocation> {
        self.package.as_ref()
    }

    /// Download URL, when a package is published.
    #[must_use]
    pub fn download_url(&self) -> Option<&str> {
        self.package.as_ref().map(|p| p.download_url.as_str())
    }

    /// Expected digest, whether or not a package URL accompanies it.
    #[must_use]
    pub fn expected_digest(&self) -> Option<&Sha256Digest> {
        self.package
            .as_ref()
            .map(|p| &p.expected_digest)
            .or(self.digest_without_package.as_ref())
    }
}

/// Wire shape of the descriptor before validation.
#[derive(Debug, Deserialize)]
struct RawMetadata {
    latest_client_version: Option<String>,
    min_required_client_version: Option<String>,
    download_url: Option<String>,
    sha256: Option<String>,
}

/// Reasons a descriptor body is rejected.
#[derive(Debug, thiserror::Error)]
pub enum MetadataParseError {
    /// The body is not a JSON object of the expected shape.
    #[error("metadata is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// `latest_client_version` is absent or blank.
    #[error("metadata lacks latest_client_version")]
    MissingLatestVersion,
    /// A package URL was published without a digest.
    #[error("metadata publishes download_url without sha256")]
    MissingDigest,
    /// The published digest is malformed.
    #[error("metadata sha256 is invalid: {0}")]
    InvalidDigest(#[from] DigestParseError),
}

/// Parse a descriptor body.
///
/// Blank strings count as absent. `min_required_client_version` defaults to
/// the latest version.
///
/// # Errors
///
/// Returns [`MetadataParseError`] when required data is missing or malformed.
///
/// # Examples
///
/// ```
/// use wsmr_updater::metadata::parse_metadata;
///
/// let json = r#"{"latest_client_version":"1.0.1","channel":"stable"}"#;
/// let metadata = parse_metadata(json).unwrap();
/// assert_eq!(metadata.min_required_version(), "1.0.1");
/// assert!(metadata.package().is_none());
/// ```
pub fn parse_metadata(body: &str) -> Result<ReleaseMetadata, MetadataParseError> {
    let raw: RawMetadata = serde_json::from_str(body)?;
    let latest_version =
        non_blank(raw.latest_client_version).ok_or(MetadataParseError::MissingLatestVersion)?;
    let min_required_version =
        non_blank(raw.min_required_client_version).unwrap_or_else(|| latest_version.clone());
    let digest = non_blank(raw.sha256)
        .map(|hex| Sha256Digest::parse(&hex))
        .transpose()?;

    let (package, digest_without_package) = match (non_blank(raw.download_url), digest) {
        (Some(download_url), Some(expected_digest)) => (
            Some(PackageLocation {
                download_url,
                expected_digest,
            }),
            None,
        ),
        (Some(_), None) => return Err(MetadataParseError::MissingDigest),
        (None, digest) => (None, digest),
    };

    Ok(ReleaseMetadata {
        latest_version,
        min_required_version,
        package,
        digest_without_package,
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// The result of a metadata fetch.
///
/// Deliberately not a `Result`: an unavailable descriptor is never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataOutcome {
    /// The descriptor was fetched and parsed.
    Available(ReleaseMetadata),
    /// The descriptor could not be obtained; skip the update.
    NotAvailable {
        /// A human-readable explanation.
        reason: String,
    },
}

/// Internal failure type; every variant becomes `NotAvailable`.
#[derive(Debug, thiserror::Error)]
enum FetchError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("server returned HTTP {0}")]
    Status(u16),

    #[error("could not read or cache metadata: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Parse(#[from] MetadataParseError),
}

/// Retrieves and caches the release descriptor.
pub struct MetadataFetcher<'a> {
    transport: &'a dyn HttpTransport,
    cache_path: PathBuf,
}

impl<'a> MetadataFetcher<'a> {
    /// Create a fetcher that caches raw bodies under `cache_dir`.
    #[must_use]
    pub fn new(transport: &'a dyn HttpTransport, cache_dir: &Path) -> Self {
        Self {
            transport,
            cache_path: cache_dir.join(METADATA_CACHE_FILENAME),
        }
    }

    /// Path of the cached raw body.
    #[must_use]
    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// Fetch `url` with a single GET bounded by `timeout`.
    #[must_use]
    pub fn fetch(&self, url: &str, timeout: Duration) -> MetadataOutcome {
        match self.try_fetch(url, timeout) {
            Ok(metadata) => {
                info!(
                    "release metadata: latest={}, min_required={}, package={}",
                    metadata.latest_version(),
                    metadata.min_required_version(),
                    metadata.download_url().unwrap_or("none")
                );
                MetadataOutcome::Available(metadata)
            }
            Err(e) => {
                info!("release metadata unavailable ({e}); skipping update check");
                MetadataOutcome::NotAvailable {
                    reason: e.to_string(),
                }
            }
        }
    }

    fn try_fetch(&self, url: &str, timeout: Duration) -> Result<ReleaseMetadata, FetchError> {
        debug!("fetching release metadata from {url}");
        let response = self.transport.get(url, Timeouts::uniform(timeout))?;
        if response.status != 200 {
            return Err(FetchError::Status(response.status));
        }

        let mut raw = Vec::new();
        response
            .body
            .take(MAX_METADATA_BYTES)
            .read_to_end(&mut raw)?;

        if let Some(parent) = self.cache_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.cache_path, &raw)?;
        debug!(
            "cached {} metadata bytes at {}",
            raw.len(),
            self.cache_path.display()
        );

        let text = String::from_utf8_lossy(&raw);
        Ok(parse_metadata(&text)?)
    }
}

#[cfg(test)]
#[path = "metadata_tests.rs"]
mod tests;
