//! Bootstrap settings loaded from `wsmr.toml`.
//!
//! Every key is optional. A missing file means defaults; an unreadable or
//! malformed file is logged and also means defaults, because a broken
//! settings file must never keep the client from starting. Command-line
//! flags are applied on top by the caller.

use std::path::PathBuf;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, warn};
use serde::Deserialize;
use wsmr_updater::http::Timeouts;
use wsmr_updater::pipeline::{DEFAULT_METADATA_URL, PipelineConfig};
use wsmr_updater::relaunch::LaunchPolicy;

/// Settings file consulted when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "wsmr.toml";

/// Errors raised while reading the settings file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("could not read {path}: {source}")]
    Read {
        /// The settings file.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The file is not valid settings TOML.
    #[error("invalid settings in {path}: {source}")]
    Parse {
        /// The settings file.
        path: Utf8PathBuf,
        /// The TOML error.
        source: toml::de::Error,
    },
}

/// Update-related settings.
///
/// # Examples
///
/// ```
/// use wsmr::config::UpdaterSettings;
///
/// let settings = UpdaterSettings::from_toml_str(
///     "metadata_url = \"https://mirror.example.test/app-version.json\"\nrelaunch = false\n",
/// )
/// .unwrap();
/// assert!(!settings.relaunch);
/// assert_eq!(settings.metadata_timeout_secs, 5);
/// ```
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct UpdaterSettings {
    /// URL of the release descriptor.
    pub metadata_url: String,
    /// Connect and read timeout for the descriptor, in seconds.
    pub metadata_timeout_secs: u64,
    /// Connect timeout for the package download, in seconds.
    pub download_connect_timeout_secs: u64,
    /// Wait for the package response head, in seconds.
    pub download_read_timeout_secs: u64,
    /// Budget for transferring the whole package body, in seconds.
    pub download_total_timeout_secs: u64,
    /// Minimum spacing between progress reports, in milliseconds.
    pub progress_interval_ms: u64,
    /// Start the new client after a successful install.
    pub relaunch: bool,
    /// Delay between starting the new client and exiting, in milliseconds.
    pub relaunch_grace_ms: u64,
    /// Launch candidate selection.
    pub launch: LaunchSettings,
}

impl Default for UpdaterSettings {
    fn default() -> Self {
        Self {
            metadata_url: DEFAULT_METADATA_URL.to_owned(),
            metadata_timeout_secs: 5,
            download_connect_timeout_secs: 15,
            download_read_timeout_secs: 30,
            download_total_timeout_secs: 600,
            progress_interval_ms: 120,
            relaunch: true,
            relaunch_grace_ms: 250,
            launch: LaunchSettings::default(),
        }
    }
}

/// The `[launch]` table.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LaunchSettings {
    /// File extensions that may be launched.
    pub extensions: Vec<String>,
    /// Substring preferring the bundled build among candidates.
    pub bundled_marker: String,
    /// Interpreter for `.jar` candidates [default: from `JAVA_HOME`].
    pub interpreter: Option<PathBuf>,
}

impl Default for LaunchSettings {
    fn default() -> Self {
        let policy = LaunchPolicy::default();
        Self {
            extensions: policy.extensions,
            bundled_marker: policy.bundled_marker,
            interpreter: policy.interpreter,
        }
    }
}

impl UpdaterSettings {
    /// Parse settings from TOML text.
    ///
    /// # Errors
    ///
    /// Returns the TOML error for malformed input or unknown keys.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Read settings from `path`.
    ///
    /// Returns `Ok(None)` when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read or parsed.
    pub fn read(path: &Utf8Path) -> Result<Option<Self>, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_owned(),
                    source,
                });
            }
        };
        Self::from_toml_str(&text)
            .map(Some)
            .map_err(|source| ConfigError::Parse {
                path: path.to_owned(),
                source,
            })
    }

    /// Load settings, falling back to defaults on any problem.
    ///
    /// `explicit` is the `--config` path; without it `wsmr.toml` in the
    /// working directory is tried.
    #[must_use]
    pub fn load(explicit: Option<&Utf8Path>) -> Self {
        let path = explicit.unwrap_or_else(|| Utf8Path::new(DEFAULT_CONFIG_FILE));
        match Self::read(path) {
            Ok(Some(settings)) => {
                debug!("loaded settings from {path}");
                settings
            }
            Ok(None) => {
                if explicit.is_some() {
                    warn!("settings file {path} not found; using defaults");
                }
                Self::default()
            }
            Err(e) => {
                warn!("{e}; using defaults");
                Self::default()
            }
        }
    }

    /// Translate into the pipeline's tunables.
    ///
    /// A timeout of zero would fail every request at once, so it is replaced
    /// by the default with a warning.
    #[must_use]
    pub fn pipeline_config(&self) -> PipelineConfig {
        let defaults = PipelineConfig::default();
        PipelineConfig {
            metadata_url: self.metadata_url.clone(),
            metadata_timeout: timeout_or_default(
                "metadata_timeout_secs",
                self.metadata_timeout_secs,
                defaults.metadata_timeout,
            ),
            download_timeouts: Timeouts {
                connect: timeout_or_default(
                    "download_connect_timeout_secs",
                    self.download_connect_timeout_secs,
                    defaults.download_timeouts.connect,
                ),
                read: timeout_or_default(
                    "download_read_timeout_secs",
                    self.download_read_timeout_secs,
                    defaults.download_timeouts.read,
                ),
                body: timeout_or_default(
                    "download_total_timeout_secs",
                    self.download_total_timeout_secs,
                    defaults.download_timeouts.body,
                ),
            },
            progress_interval: Duration::from_millis(self.progress_interval_ms),
            relaunch: self.relaunch,
            relaunch_grace: Duration::from_millis(self.relaunch_grace_ms),
            launch_policy: LaunchPolicy {
                extensions: self.launch.extensions.clone(),
                bundled_marker: self.launch.bundled_marker.clone(),
                interpreter: self.launch.interpreter.clone(),
            },
        }
    }
}

fn timeout_or_default(key: &str, secs: u64, default: Duration) -> Duration {
    if secs == 0 {
        warn!("{key} = 0 would time out immediately; using {}s", default.as_secs());
        default
    } else {
        Duration::from_secs(secs)
    }
}
