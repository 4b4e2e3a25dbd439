//! Log subscriber initialisation.
//!
//! Library crates log through the `log` facade. The binary installs a
//! `tracing-subscriber` formatter on stderr; its `tracing-log` bridge picks
//! up the `log` records. `WSMR_LOG` takes precedence over the `-v`/`-q`
//! flags and accepts the usual filter syntax.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "WSMR_LOG";

/// Filter directive implied by the verbosity flags.
///
/// # Examples
///
/// ```
/// use wsmr::logging::default_directive;
///
/// assert_eq!(default_directive(0, false), "info");
/// assert_eq!(default_directive(0, true), "warn");
/// assert_eq!(default_directive(2, false), "trace");
/// ```
#[must_use]
pub fn default_directive(verbosity: u8, quiet: bool) -> &'static str {
    match (quiet, verbosity) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    }
}

/// Build the filter from `WSMR_LOG`, falling back to the flags.
#[must_use]
pub fn build_filter(env_value: Option<&str>, verbosity: u8, quiet: bool) -> EnvFilter {
    env_value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .and_then(|value| EnvFilter::try_new(value).ok())
        .unwrap_or_else(|| EnvFilter::new(default_directive(verbosity, quiet)))
}

/// Install the global subscriber.
///
/// Calling this twice is harmless; the second call is ignored.
pub fn init(verbosity: u8, quiet: bool) {
    let env_value = std::env::var(LOG_ENV).ok();
    let filter = build_filter(env_value.as_deref(), verbosity, quiet);
    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_err()
    {
        // A subscriber is already installed.
    }
}
