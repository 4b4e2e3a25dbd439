//! Human-readable progress formatting.

use std::fmt::Display;
use std::io::Write;

use crate::download::DownloadProgress;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Write one line to `stderr`, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort output; a closed stderr must not abort the update.
    }
}

/// Format a byte count in mebibytes with one decimal, rounded half up.
///
/// # Examples
///
/// ```
/// use wsmr_updater::output::human_size;
///
/// assert_eq!(human_size(0), "0.0 MB");
/// assert_eq!(human_size(12_897_484), "12.3 MB");
/// ```
#[must_use]
pub fn human_size(bytes: u64) -> String {
    let tenths = (u128::from(bytes) * 10 + u128::from(BYTES_PER_MB) / 2) / u128::from(BYTES_PER_MB);
    format!("{}.{} MB", tenths / 10, tenths % 10)
}

/// Describe a progress sample, e.g. `3.0 MB / 12.3 MB (24%)`.
#[must_use]
pub fn describe_progress(progress: &DownloadProgress) -> String {
    let done = human_size(progress.downloaded);
    match (progress.total, progress.percent()) {
        (Some(total), Some(percent)) => format!("{done} / {} ({percent}%)", human_size(total)),
        _ => done,
    }
}
