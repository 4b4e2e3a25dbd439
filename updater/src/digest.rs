//! SHA-256 integrity verification for downloaded packages.
//!
//! Digests are computed with a fixed-size buffer loop so package size never
//! affects memory use. A mismatch is an expected outcome (stale metadata or a
//! corrupted transfer), not an exception: [`IntegrityVerifier`] reports it as
//! a value and removes the rejected file.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use log::{debug, warn};
use sha2::{Digest, Sha256};

use crate::download::DownloadedArtifact;

/// Expected length of a hex-encoded SHA-256 digest.
const DIGEST_HEX_LEN: usize = 64;

/// Read buffer used while hashing.
const HASH_BUFFER_SIZE: usize = 128 * 1024;

/// Log target for integrity events, kept distinct so operators can filter it.
pub const INTEGRITY_LOG_TARGET: &str = "wsmr_updater::integrity";

/// A validated, lowercase, hex-encoded SHA-256 digest.
///
/// Parsing accepts either case and normalises to lowercase.
///
/// # Examples
///
/// ```
/// use wsmr_updater::digest::Sha256Digest;
///
/// let digest = Sha256Digest::parse(&"AB".repeat(32)).unwrap();
/// assert_eq!(digest.as_str(), "ab".repeat(32));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sha256Digest(String);

/// Reasons a digest string is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DigestParseError {
    /// The string is not 64 characters long.
    #[error("expected {DIGEST_HEX_LEN} hex characters, got {0}")]
    Length(usize),
    /// The string contains a non-hex character.
    #[error("non-hex character '{0}'")]
    NonHex(char),
}

impl Sha256Digest {
    /// Validate and normalise a hex digest.
    ///
    /// # Errors
    ///
    /// Returns [`DigestParseError`] when the value is not 64 hex characters.
    pub fn parse(value: &str) -> Result<Self, DigestParseError> {
        let trimmed = value.trim();
        if trimmed.len() != DIGEST_HEX_LEN {
            return Err(DigestParseError::Length(trimmed.len()));
        }
        if let Some(bad) = trimmed.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(DigestParseError::NonHex(bad));
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    /// Return the digest as a lowercase hex string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compare against a hex string without regard to case.
    #[must_use]
    pub fn matches_hex(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other.trim())
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the SHA-256 digest of the file at `path`.
///
/// # Errors
///
/// Returns any I/O error raised while opening or reading the file.
pub fn compute_sha256(path: &Path) -> io::Result<Sha256Digest> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];
    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(buffer.get(..bytes_read).unwrap_or_default());
    }
    Ok(Sha256Digest(format!("{:x}", hasher.finalize())))
}

/// Return whether the file at `path` hashes to `expected_hex`.
///
/// # Errors
///
/// Returns any I/O error raised while hashing.
pub fn verify(path: &Path, expected_hex: &str) -> io::Result<bool> {
    Ok(compute_sha256(path)?.matches_hex(expected_hex))
}

/// Errors from artifact verification.
#[derive(Debug, thiserror::Error)]
pub enum IntegrityError {
    /// The computed digest differs from the published one.
    #[error("checksum mismatch: expected {expected}, actual {actual}")]
    Mismatch {
        /// Digest published in the release metadata.
        expected: Sha256Digest,
        /// Digest of the downloaded bytes.
        actual: Sha256Digest,
    },
    /// The artifact could not be read.
    #[error("checksum computation failed: {0}")]
    Io(#[from] io::Error),
}

/// A downloaded package whose digest matched the release metadata.
#[derive(Debug)]
pub struct VerifiedArtifact {
    artifact: DownloadedArtifact,
    digest: Sha256Digest,
}

impl VerifiedArtifact {
    /// Path of the verified archive.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.artifact.path()
    }

    /// The digest that was confirmed.
    #[must_use]
    pub fn digest(&self) -> &Sha256Digest {
        &self.digest
    }

    /// Remove the archive once it has been consumed.
    pub fn discard(self) {
        self.artifact.discard();
    }
}

/// Promotes downloaded artifacts to verified ones or discards them.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegrityVerifier;

impl IntegrityVerifier {
    /// Verify `artifact` against `expected`.
    ///
    /// On mismatch or read failure the artifact file is removed so no later
    /// stage can pick it up.
    ///
    /// # Errors
    ///
    /// Returns [`IntegrityError::Mismatch`] or [`IntegrityError::Io`].
    pub fn verify_artifact(
        self,
        artifact: DownloadedArtifact,
        expected: &Sha256Digest,
    ) -> Result<VerifiedArtifact, IntegrityError> {
        let actual = match compute_sha256(artifact.path()) {
            Ok(actual) => actual,
            Err(e) => {
                artifact.discard();
                return Err(IntegrityError::Io(e));
            }
        };
        if actual != *expected {
            warn!(
                target: INTEGRITY_LOG_TARGET,
                "SHA-256 mismatch for {}: expected {expected}, got {actual}; package rejected",
                artifact.path().display()
            );
            artifact.discard();
            return Err(IntegrityError::Mismatch {
                expected: expected.clone(),
                actual,
            });
        }
        debug!("SHA-256 verified for {}", artifact.path().display());
        Ok(VerifiedArtifact {
            artifact,
            digest: actual,
        })
    }
}

#[cfg(test)]
#[path = "digest_tests.rs"]
mod tests;
