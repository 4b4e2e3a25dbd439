//! Error taxonomy for the update pipeline.
//!
//! Each stage owns a narrow error enum; [`UpdateError`] gathers them so the
//! pipeline can report which stage gave up. None of these ever reach the
//! caller of [`run_update_pipeline`](crate::pipeline::run_update_pipeline):
//! they are logged and absorbed into an [`UpdateOutcome`](crate::UpdateOutcome).

use thiserror::Error;

use crate::digest::IntegrityError;
use crate::download::DownloadError;
use crate::install::InstallError;
use crate::relaunch::RelaunchError;

/// A stage of the update pipeline gave up.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// No usable release descriptor was obtained.
    #[error("release metadata unavailable: {reason}")]
    MetadataUnavailable {
        /// Why the descriptor could not be used.
        reason: String,
    },

    /// The package could not be downloaded.
    #[error("package download failed: {0}")]
    DownloadFailed(#[from] DownloadError),

    /// The package digest did not match or could not be computed.
    #[error("package integrity check failed: {0}")]
    IntegrityMismatch(#[from] IntegrityError),

    /// The verified package could not be installed.
    #[error("package installation failed: {0}")]
    InstallFailed(#[from] InstallError),

    /// The installed client could not be started.
    #[error("relaunch failed: {0}")]
    RelaunchFailed(#[from] RelaunchError),
}

/// Convenience alias for pipeline results.
pub type Result<T> = std::result::Result<T, UpdateError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn stage_errors_convert_into_update_error() {
        let err: UpdateError = InstallError::EmptyPackage.into();
        assert!(matches!(err, UpdateError::InstallFailed(_)));
        assert_eq!(
            err.to_string(),
            "package installation failed: package was empty"
        );
    }

    #[test]
    fn relaunch_error_names_directory() {
        let err: UpdateError = RelaunchError::NoCandidate {
            dir: PathBuf::from("/opt/wsmr/app"),
        }
        .into();
        assert!(err.to_string().contains("/opt/wsmr/app"));
    }

    #[test]
    fn truncation_reports_sizes() {
        let err: UpdateError = DownloadError::Truncated {
            received: 10,
            expected: 20,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "package download failed: download truncated: received 10 of 20 bytes"
        );
    }
}
