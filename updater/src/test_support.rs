//! Fixture helpers shared by unit, integration and behaviour tests.
//!
//! Available under `cfg(test)` and behind the `test-support` feature. The
//! fakes record what the pipeline asked of them so tests can assert, for
//! example, that a failed descriptor fetch never touched the package URL.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io::{self, Cursor, Write};

use sha2::{Digest, Sha256};
use zip::write::SimpleFileOptions;

use crate::download::DownloadProgress;
use crate::http::{HttpResponse, HttpTransport, Timeouts, TransportError};
use crate::pipeline::{UpdateObserver, UpdateState};
use crate::relaunch::{LaunchCommand, ProcessSpawner, Terminator};

/// Lowercase hex SHA-256 of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

/// Build an in-memory ZIP archive.
///
/// Names ending in `/` become directory entries; everything else is a file
/// with the given contents.
///
/// # Panics
///
/// Panics if the archive cannot be written, which only happens on invalid
/// entry names.
#[must_use]
pub fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, contents) in entries {
        if name.ends_with('/') {
            writer
                .add_directory(*name, options)
                .expect("add directory entry");
        } else {
            writer.start_file(*name, options).expect("start file entry");
            writer.write_all(contents.as_bytes()).expect("write file entry");
        }
    }
    writer.finish().expect("finish archive").into_inner()
}

/// Render a release descriptor.
#[must_use]
pub fn metadata_json(
    latest: &str,
    min_required: &str,
    download_url: Option<&str>,
    sha256: Option<&str>,
) -> String {
    serde_json::json!({
        "latest_client_version": latest,
        "min_required_client_version": min_required,
        "download_url": download_url,
        "sha256": sha256,
    })
    .to_string()
}

#[derive(Debug, Clone)]
enum Scripted {
    Respond { status: u16, body: Vec<u8> },
    Fail { reason: String },
}

/// An [`HttpTransport`] that serves canned responses per URL.
///
/// Requests for unscripted URLs fail like a refused connection. Every
/// requested URL is recorded in order.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    routes: HashMap<String, Scripted>,
    requests: RefCell<Vec<String>>,
}

impl ScriptedTransport {
    /// Create a transport with no routes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` with `status` for `url`.
    #[must_use]
    pub fn with_response(mut self, url: &str, status: u16, body: impl Into<Vec<u8>>) -> Self {
        self.routes.insert(
            url.to_owned(),
            Scripted::Respond {
                status,
                body: body.into(),
            },
        );
        self
    }

    /// Fail every request for `url` with `reason`.
    #[must_use]
    pub fn with_failure(mut self, url: &str, reason: &str) -> Self {
        self.routes.insert(
            url.to_owned(),
            Scripted::Fail {
                reason: reason.to_owned(),
            },
        );
        self
    }

    /// URLs requested so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }

    /// Whether `url` was requested at least once.
    #[must_use]
    pub fn was_requested(&self, url: &str) -> bool {
        self.requests.borrow().iter().any(|requested| requested == url)
    }
}

impl HttpTransport for ScriptedTransport {
    fn get(&self, url: &str, _timeouts: Timeouts) -> Result<HttpResponse, TransportError> {
        self.requests.borrow_mut().push(url.to_owned());
        match self.routes.get(url) {
            Some(Scripted::Respond { status, body }) => {
                Ok(HttpResponse::from_bytes(*status, body.clone()))
            }
            Some(Scripted::Fail { reason }) => Err(TransportError::Request {
                url: url.to_owned(),
                reason: reason.clone(),
            }),
            None => Err(TransportError::Request {
                url: url.to_owned(),
                reason: "connection refused".to_owned(),
            }),
        }
    }
}

/// A [`ProcessSpawner`] that records commands instead of starting them.
#[derive(Debug, Default)]
pub struct RecordingSpawner {
    fail: bool,
    spawned: RefCell<Vec<LaunchCommand>>,
}

impl RecordingSpawner {
    /// Create a spawner whose spawns succeed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a spawner whose spawns fail with `PermissionDenied`.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            spawned: RefCell::default(),
        }
    }

    /// Commands passed to [`ProcessSpawner::spawn`], in order.
    #[must_use]
    pub fn spawned(&self) -> Vec<LaunchCommand> {
        self.spawned.borrow().clone()
    }
}

impl ProcessSpawner for RecordingSpawner {
    fn spawn(&self, command: &LaunchCommand) -> io::Result<()> {
        self.spawned.borrow_mut().push(command.clone());
        if self.fail {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "spawn refused",
            ));
        }
        Ok(())
    }
}

/// A [`Terminator`] that counts calls instead of exiting.
#[derive(Debug, Default)]
pub struct RecordingTerminator {
    calls: Cell<usize>,
}

impl RecordingTerminator {
    /// Create a terminator with no recorded calls.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of termination requests.
    #[must_use]
    pub fn terminations(&self) -> usize {
        self.calls.get()
    }
}

impl Terminator for RecordingTerminator {
    fn terminate(&self) {
        self.calls.set(self.calls.get() + 1);
    }
}

/// An [`UpdateObserver`] that keeps every notification.
#[derive(Debug, Default, Clone)]
pub struct RecordingObserver {
    /// State transitions in order.
    pub states: Vec<UpdateState>,
    /// Progress samples in order.
    pub progress: Vec<DownloadProgress>,
}

impl UpdateObserver for RecordingObserver {
    fn on_state(&mut self, state: UpdateState) {
        self.states.push(state);
    }

    fn on_progress(&mut self, progress: DownloadProgress) {
        self.progress.push(progress);
    }
}
