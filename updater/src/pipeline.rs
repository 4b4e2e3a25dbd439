//! The update state machine.
//!
//! A run walks `Checking → (NoMetadata | UpToDate | UpdateAvailable |
//! UpdateRequired) → Downloading → Verifying → Verified → Installing →
//! Relaunching → Done`, with any stage able to divert to `Failed → Done`.
//! Nothing here is fatal: the caller always receives an [`UpdateOutcome`] and
//! continues normal start-up unless the process was handed off to a freshly
//! installed client.

use std::path::PathBuf;
use std::time::Duration;

use log::{error, info, warn};

use crate::digest::{IntegrityVerifier, Sha256Digest};
use crate::dirs::{BaseDirs, SystemBaseDirs};
use crate::download::{DEFAULT_PROGRESS_INTERVAL, DownloadProgress, PackageDownloader};
use crate::error::{Result, UpdateError};
use crate::http::{HttpTransport, Timeouts, UreqTransport};
use crate::install::{InstalledPackage, PackageInstaller, ZipInstaller};
use crate::metadata::{MetadataFetcher, MetadataOutcome, ReleaseMetadata};
use crate::relaunch::{
    DEFAULT_RELAUNCH_GRACE, LaunchPolicy, ProcessRelauncher, ProcessSpawner, ProcessTerminator,
    SystemProcessSpawner, Terminator,
};
use crate::version::VersionToken;

/// Release descriptor consulted when no override is configured.
pub const DEFAULT_METADATA_URL: &str =
    "https://raw.githubusercontent.com/RY84/ERP/main/app-version.json";

/// File name of the downloaded archive inside the cache directory.
pub const PACKAGE_CACHE_FILENAME: &str = "client-latest.zip";

/// `User-Agent` sent with every update request.
pub const USER_AGENT: &str = concat!("wsmr-updater/", env!("CARGO_PKG_VERSION"));

/// Observable stages of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateState {
    /// Fetching the release descriptor.
    Checking,
    /// No usable descriptor; start normally.
    NoMetadata,
    /// The running client is current.
    UpToDate,
    /// A newer client is published.
    UpdateAvailable,
    /// The running client is below the minimum supported version.
    UpdateRequired,
    /// Streaming the package archive.
    Downloading,
    /// Hashing the archive.
    Verifying,
    /// The archive digest matched.
    Verified,
    /// Moving files into the install directory.
    Installing,
    /// Starting the installed client.
    Relaunching,
    /// A stage gave up; the existing installation is kept.
    Failed,
    /// The run is over.
    Done,
}

/// How the running version relates to the published release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateDecision {
    /// Nothing newer is published.
    UpToDate,
    /// A newer version exists; the running one is still supported.
    Available,
    /// The running version is below the supported minimum.
    Required,
}

impl UpdateDecision {
    /// Classify `local` against the descriptor.
    ///
    /// # Examples
    ///
    /// ```
    /// use wsmr_updater::metadata::parse_metadata;
    /// use wsmr_updater::pipeline::UpdateDecision;
    ///
    /// let metadata = parse_metadata(
    ///     r#"{"latest_client_version":"1.2.0","min_required_client_version":"1.1"}"#,
    /// ).unwrap();
    /// assert_eq!(UpdateDecision::decide("1.0.9", &metadata), UpdateDecision::Required);
    /// assert_eq!(UpdateDecision::decide("1.1.0", &metadata), UpdateDecision::Available);
    /// assert_eq!(UpdateDecision::decide("1.2", &metadata), UpdateDecision::UpToDate);
    /// ```
    #[must_use]
    pub fn decide(local: &str, metadata: &ReleaseMetadata) -> Self {
        let local = VersionToken::parse(local);
        if local < VersionToken::parse(metadata.min_required_version()) {
            Self::Required
        } else if local < VersionToken::parse(metadata.latest_version()) {
            Self::Available
        } else {
            Self::UpToDate
        }
    }

    /// The state announced for this decision.
    #[must_use]
    pub fn state(self) -> UpdateState {
        match self {
            Self::UpToDate => UpdateState::UpToDate,
            Self::Available => UpdateState::UpdateAvailable,
            Self::Required => UpdateState::UpdateRequired,
        }
    }
}

/// The result of a pipeline run.
///
/// Deliberately not a `Result`: every failure means "start the existing
/// installation normally".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Nothing was installed.
    None,
    /// A new version was installed but not started.
    InstalledNoRelaunch,
    /// The new version was started and the process handed off.
    Relaunched,
}

/// Receives state transitions and download progress.
///
/// Both methods default to doing nothing.
pub trait UpdateObserver {
    /// Called on every state transition.
    fn on_state(&mut self, _state: UpdateState) {}

    /// Called with throttled download progress.
    fn on_progress(&mut self, _progress: DownloadProgress) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl UpdateObserver for NoopObserver {}

/// Tunables for a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// URL of the release descriptor.
    pub metadata_url: String,
    /// Connect and read timeout for the descriptor request.
    pub metadata_timeout: Duration,
    /// Timeouts for the package download.
    pub download_timeouts: Timeouts,
    /// Minimum spacing between progress callbacks.
    pub progress_interval: Duration,
    /// Whether to start the installed client after installation.
    pub relaunch: bool,
    /// Delay between spawning the new client and exiting.
    pub relaunch_grace: Duration,
    /// Which installed file to launch and how.
    pub launch_policy: LaunchPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            metadata_url: DEFAULT_METADATA_URL.to_owned(),
            metadata_timeout: Duration::from_secs(5),
            download_timeouts: Timeouts {
                connect: Duration::from_secs(15),
                read: Duration::from_secs(30),
                body: Duration::from_secs(600),
            },
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            relaunch: true,
            relaunch_grace: DEFAULT_RELAUNCH_GRACE,
            launch_policy: LaunchPolicy::default(),
        }
    }
}

/// The seams a pipeline run talks through.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    /// Issues the descriptor and package requests.
    pub transport: &'a dyn HttpTransport,
    /// Installs verified archives.
    pub installer: &'a dyn PackageInstaller,
    /// Starts the installed client.
    pub spawner: &'a dyn ProcessSpawner,
    /// Ends the current process after a handoff.
    pub terminator: &'a dyn Terminator,
}

/// Sequences metadata, download, verification, installation and relaunch.
pub struct UpdatePipeline<'a> {
    config: &'a PipelineConfig,
    dirs: &'a dyn BaseDirs,
    seams: Collaborators<'a>,
}

/// Where a run reads and writes.
struct Locations {
    cache_dir: PathBuf,
    install_dir: PathBuf,
}

impl<'a> UpdatePipeline<'a> {
    /// Create a pipeline over the given configuration and seams.
    #[must_use]
    pub fn new(config: &'a PipelineConfig, dirs: &'a dyn BaseDirs, seams: Collaborators<'a>) -> Self {
        Self {
            config,
            dirs,
            seams,
        }
    }

    /// Run the pipeline for the client at `current_version`.
    pub fn run(&self, current_version: &str, observer: &mut dyn UpdateObserver) -> UpdateOutcome {
        let Some(locations) = self.locations() else {
            warn!("cache or install directory unavailable; skipping update");
            observer.on_state(UpdateState::Failed);
            return finish(observer, UpdateOutcome::None);
        };

        observer.on_state(UpdateState::Checking);
        let fetcher = MetadataFetcher::new(self.seams.transport, &locations.cache_dir);
        let metadata = match fetcher.fetch(&self.config.metadata_url, self.config.metadata_timeout)
        {
            MetadataOutcome::Available(metadata) => metadata,
            MetadataOutcome::NotAvailable { reason } => {
                let err = UpdateError::MetadataUnavailable { reason };
                info!("{err}; starting normally");
                observer.on_state(UpdateState::NoMetadata);
                return finish(observer, UpdateOutcome::None);
            }
        };

        let decision = UpdateDecision::decide(current_version, &metadata);
        observer.on_state(decision.state());
        match decision {
            UpdateDecision::UpToDate => {
                info!("client {current_version} is up to date");
                return finish(observer, UpdateOutcome::None);
            }
            UpdateDecision::Required => info!(
                "client {current_version} is below minimum {}; updating to {}",
                metadata.min_required_version(),
                metadata.latest_version()
            ),
            UpdateDecision::Available => info!(
                "client {} is available (running {current_version})",
                metadata.latest_version()
            ),
        }

        let Some(package) = metadata.package() else {
            warn!(
                "release {} publishes no package; skipping update",
                metadata.latest_version()
            );
            return finish(observer, UpdateOutcome::None);
        };

        let installed = match self.fetch_and_install(
            &package.download_url,
            &package.expected_digest,
            &locations,
            observer,
        ) {
            Ok(installed) => installed,
            Err(e) => {
                warn!("update abandoned: {e}; keeping the current installation");
                observer.on_state(UpdateState::Failed);
                return finish(observer, UpdateOutcome::None);
            }
        };
        info!(
            "installed {} file(s) into {}",
            installed.files().len(),
            installed.target_dir().display()
        );

        if !self.config.relaunch {
            return finish(observer, UpdateOutcome::InstalledNoRelaunch);
        }
        observer.on_state(UpdateState::Relaunching);
        self.relaunch(locations.install_dir, observer)
    }

    fn locations(&self) -> Option<Locations> {
        Some(Locations {
            cache_dir: self.dirs.cache_dir()?,
            install_dir: self.dirs.install_dir()?,
        })
    }

    fn fetch_and_install(
        &self,
        url: &str,
        expected: &Sha256Digest,
        locations: &Locations,
        observer: &mut dyn UpdateObserver,
    ) -> Result<InstalledPackage> {
        observer.on_state(UpdateState::Downloading);
        let destination = locations.cache_dir.join(PACKAGE_CACHE_FILENAME);
        let artifact = PackageDownloader::new(self.seams.transport, self.config.download_timeouts)
            .with_progress_interval(self.config.progress_interval)
            .download(url, &destination, &mut |progress| {
                observer.on_progress(progress);
            })?;

        observer.on_state(UpdateState::Verifying);
        let verified = IntegrityVerifier.verify_artifact(artifact, expected)?;
        observer.on_state(UpdateState::Verified);

        observer.on_state(UpdateState::Installing);
        let installed = self
            .seams
            .installer
            .install(verified.path(), &locations.install_dir);
        verified.discard();
        installed.map_err(UpdateError::from)
    }

    fn relaunch(&self, install_dir: PathBuf, observer: &mut dyn UpdateObserver) -> UpdateOutcome {
        let relauncher = ProcessRelauncher::new(
            install_dir,
            self.config.launch_policy.clone(),
            self.seams.spawner,
            self.seams.terminator,
        )
        .with_grace(self.config.relaunch_grace);

        match relauncher.spawn() {
            Ok(_) => {
                observer.on_state(UpdateState::Done);
                relauncher.hand_off();
                UpdateOutcome::Relaunched
            }
            Err(e) => {
                let err = UpdateError::from(e);
                error!("{err}; continuing with the current process");
                finish(observer, UpdateOutcome::InstalledNoRelaunch)
            }
        }
    }
}

fn finish(observer: &mut dyn UpdateObserver, outcome: UpdateOutcome) -> UpdateOutcome {
    observer.on_state(UpdateState::Done);
    outcome
}

/// Run the update pipeline with production defaults.
///
/// Uses the platform directories, the `ureq` transport, the ZIP installer and
/// a real process handoff. Returns only when no relaunch took place.
#[must_use]
pub fn run_update_pipeline(current_version: &str) -> UpdateOutcome {
    run_update_pipeline_with(
        current_version,
        &PipelineConfig::default(),
        &SystemBaseDirs,
        &mut NoopObserver,
    )
}

/// Run the update pipeline with production seams and the given settings.
///
/// Tests that need fake seams construct an [`UpdatePipeline`] directly.
#[must_use]
pub fn run_update_pipeline_with(
    current_version: &str,
    config: &PipelineConfig,
    dirs: &dyn BaseDirs,
    observer: &mut dyn UpdateObserver,
) -> UpdateOutcome {
    let transport = UreqTransport::with_user_agent(USER_AGENT);
    let installer = ZipInstaller::with_executable_extensions(&config.launch_policy.extensions);
    let seams = Collaborators {
        transport: &transport,
        installer: &installer,
        spawner: &SystemProcessSpawner,
        terminator: &ProcessTerminator,
    };
    UpdatePipeline::new(config, dirs, seams).run(current_version, observer)
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
