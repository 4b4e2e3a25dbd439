//! Update preflight, probe command and progress reporting.
//!
//! The preflight runs the update pipeline on a worker thread and blocks on
//! its completion signal; whatever happens, control comes back here unless
//! the process was handed off to a freshly installed client.

use std::io::Write;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use log::{info, warn};
use wsmr_updater::dirs::{BaseDirs, SystemBaseDirs};
use wsmr_updater::download::DownloadProgress;
use wsmr_updater::http::HttpTransport;
use wsmr_updater::metadata::{MetadataFetcher, MetadataOutcome};
use wsmr_updater::output::{describe_progress, write_stderr_line};
use wsmr_updater::pipeline::{
    PipelineConfig, UpdateDecision, UpdateObserver, UpdateOutcome, UpdateState,
};
use wsmr_updater::worker::UpdateWorker;

use crate::cli::Cli;
use crate::config::UpdaterSettings;

/// Environment variable that overrides the reported client version.
pub const VERSION_OVERRIDE_ENV: &str = "WSMR_VERSION_OVERRIDE";

/// Errors that end the probe command.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// No cache directory could be determined.
    #[error("could not determine the cache directory")]
    NoCacheDir,

    /// The release descriptor could not be used.
    #[error("release metadata unavailable: {reason}")]
    MetadataUnavailable {
        /// Why the descriptor was rejected.
        reason: String,
    },

    /// Writing the report failed.
    #[error("could not write report: {0}")]
    Output(#[from] std::io::Error),
}

/// Version of the running client.
///
/// `WSMR_VERSION_OVERRIDE` wins when set and non-blank.
#[must_use]
pub fn current_version() -> String {
    current_version_from(std::env::var(VERSION_OVERRIDE_ENV).ok())
}

/// Resolve the client version from an optional override.
///
/// # Examples
///
/// ```
/// use wsmr::startup::current_version_from;
///
/// assert_eq!(current_version_from(Some(" 0.9.0 ".to_owned())), "0.9.0");
/// assert_eq!(current_version_from(None), env!("CARGO_PKG_VERSION"));
/// ```
#[must_use]
pub fn current_version_from(override_value: Option<String>) -> String {
    override_value
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_owned())
}

/// Apply command-line overrides to loaded settings.
pub fn apply_overrides(settings: &mut UpdaterSettings, cli: &Cli) {
    if let Some(url) = &cli.common.update_url {
        settings.metadata_url.clone_from(url);
    }
    if cli.run_args().no_relaunch {
        settings.relaunch = false;
    }
}

/// Platform directories with per-directory overrides.
#[derive(Debug, Clone, Default)]
pub struct OverrideDirs {
    cache: Option<PathBuf>,
    install: Option<PathBuf>,
}

impl OverrideDirs {
    /// Build from the `--cache-dir` and `--install-dir` flags.
    #[must_use]
    pub fn new(cache: Option<Utf8PathBuf>, install: Option<Utf8PathBuf>) -> Self {
        Self {
            cache: cache.map(Utf8PathBuf::into_std_path_buf),
            install: install.map(Utf8PathBuf::into_std_path_buf),
        }
    }
}

impl BaseDirs for OverrideDirs {
    fn cache_dir(&self) -> Option<PathBuf> {
        self.cache.clone().or_else(|| SystemBaseDirs.cache_dir())
    }

    fn install_dir(&self) -> Option<PathBuf> {
        self.install.clone().or_else(|| SystemBaseDirs.install_dir())
    }
}

/// Prints update phases and download progress to a writer.
pub struct StderrReporter<W> {
    out: W,
}

impl<W: Write> StderrReporter<W> {
    /// Report to `out`.
    #[must_use]
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Give back the writer.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.out
    }
}

/// The line announced for `state`, if any.
#[must_use]
pub fn phase_message(state: UpdateState) -> Option<&'static str> {
    match state {
        UpdateState::Checking => Some("Checking for updates..."),
        UpdateState::NoMetadata => Some("Update server unavailable; starting normally."),
        UpdateState::UpToDate => Some("Client is up to date."),
        UpdateState::UpdateAvailable => Some("A new version is available."),
        UpdateState::UpdateRequired => Some("This version is no longer supported; updating."),
        UpdateState::Downloading => Some("Connecting to the download server..."),
        UpdateState::Verifying => Some("Verifying package..."),
        UpdateState::Verified => Some("Verification OK."),
        UpdateState::Installing => Some("Installing update..."),
        UpdateState::Relaunching => Some("Restarting into the new version..."),
        UpdateState::Failed => Some("Update failed; starting the current version."),
        UpdateState::Done => None,
    }
}

impl<W: Write> UpdateObserver for StderrReporter<W> {
    fn on_state(&mut self, state: UpdateState) {
        if let Some(message) = phase_message(state) {
            write_stderr_line(&mut self.out, message);
        }
    }

    fn on_progress(&mut self, progress: DownloadProgress) {
        write_stderr_line(
            &mut self.out,
            format!("Downloading: {}", describe_progress(&progress)),
        );
    }
}

/// Run the update pipeline on a worker thread and wait for it.
#[must_use]
pub fn run_preflight(
    version: &str,
    config: PipelineConfig,
    dirs: Box<dyn BaseDirs + Send>,
    observer: Box<dyn UpdateObserver + Send>,
) -> UpdateOutcome {
    match UpdateWorker::spawn(version.to_owned(), config, dirs, observer) {
        Ok(worker) => worker.wait(),
        Err(e) => {
            warn!("could not start update worker: {e}");
            UpdateOutcome::None
        }
    }
}

/// Outcome message shown once the preflight is over.
#[must_use]
pub fn outcome_message(outcome: UpdateOutcome) -> &'static str {
    match outcome {
        UpdateOutcome::None => "Starting WSMR.",
        UpdateOutcome::InstalledNoRelaunch => {
            "Update installed; it takes effect the next time WSMR starts."
        }
        UpdateOutcome::Relaunched => "Handed over to the updated client.",
    }
}

/// Fetch the descriptor and report the decision without downloading.
///
/// # Errors
///
/// Returns [`StartupError`] when the descriptor cannot be used or the report
/// cannot be written.
pub fn probe(
    transport: &dyn HttpTransport,
    dirs: &dyn BaseDirs,
    config: &PipelineConfig,
    version: &str,
    out: &mut dyn Write,
) -> Result<UpdateDecision, StartupError> {
    let cache_dir = dirs.cache_dir().ok_or(StartupError::NoCacheDir)?;
    let fetcher = MetadataFetcher::new(transport, &cache_dir);
    let metadata = match fetcher.fetch(&config.metadata_url, config.metadata_timeout) {
        MetadataOutcome::Available(metadata) => metadata,
        MetadataOutcome::NotAvailable { reason } => {
            return Err(StartupError::MetadataUnavailable { reason });
        }
    };

    let decision = UpdateDecision::decide(version, &metadata);
    writeln!(out, "source:           {}", config.metadata_url)?;
    writeln!(out, "cached at:        {}", fetcher.cache_path().display())?;
    writeln!(out, "running version:  {version}")?;
    writeln!(out, "latest version:   {}", metadata.latest_version())?;
    writeln!(out, "minimum version:  {}", metadata.min_required_version())?;
    writeln!(
        out,
        "package:          {}",
        metadata.download_url().unwrap_or("(none)")
    )?;
    writeln!(
        out,
        "sha256:           {}",
        metadata
            .expected_digest()
            .map_or("(none)", |digest| digest.as_str())
    )?;
    writeln!(out, "decision:         {decision:?}")?;
    info!("probe decision for {version}: {decision:?}");
    Ok(decision)
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
