//! Background execution with a completion signal.
//!
//! The update check runs off the UI thread. The caller keeps an
//! [`UpdateWorker`] handle and blocks on [`UpdateWorker::wait`] before it
//! starts the main window; a worker that panics counts as "nothing
//! installed".

use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error};

use crate::dirs::BaseDirs;
use crate::pipeline::{PipelineConfig, UpdateObserver, UpdateOutcome, run_update_pipeline_with};

/// Handle to a pipeline running on its own thread.
#[derive(Debug)]
pub struct UpdateWorker {
    done: Receiver<UpdateOutcome>,
    handle: Option<JoinHandle<()>>,
}

impl UpdateWorker {
    /// Run the production pipeline on a dedicated thread.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the thread cannot be created.
    pub fn spawn(
        current_version: String,
        config: PipelineConfig,
        dirs: Box<dyn BaseDirs + Send>,
        mut observer: Box<dyn UpdateObserver + Send>,
    ) -> std::io::Result<Self> {
        Self::spawn_with(move || {
            run_update_pipeline_with(&current_version, &config, dirs.as_ref(), observer.as_mut())
        })
    }

    /// Run `job` on a dedicated thread and signal its outcome.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the thread cannot be created.
    pub fn spawn_with<F>(job: F) -> std::io::Result<Self>
    where
        F: FnOnce() -> UpdateOutcome + Send + 'static,
    {
        let (tx, done) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("wsmr-update".to_owned())
            .spawn(move || {
                let outcome = job();
                if tx.send(outcome).is_err() {
                    debug!("update outcome {outcome:?} had no listener");
                }
            })?;
        Ok(Self {
            done,
            handle: Some(handle),
        })
    }

    /// Block until the pipeline finishes.
    ///
    /// A worker that panicked yields [`UpdateOutcome::None`].
    #[must_use]
    pub fn wait(mut self) -> UpdateOutcome {
        let outcome = self.done.recv().ok();
        self.finish(outcome)
    }

    /// Block for at most `timeout`.
    ///
    /// Returns `Err(self)` when the pipeline is still running so the caller
    /// can keep waiting.
    ///
    /// # Errors
    ///
    /// Hands the worker back when `timeout` elapses first.
    pub fn wait_timeout(mut self, timeout: Duration) -> Result<UpdateOutcome, Self> {
        match self.done.recv_timeout(timeout) {
            Ok(outcome) => Ok(self.finish(Some(outcome))),
            Err(RecvTimeoutError::Timeout) => Err(self),
            Err(RecvTimeoutError::Disconnected) => Ok(self.finish(None)),
        }
    }

    fn finish(&mut self, outcome: Option<UpdateOutcome>) -> UpdateOutcome {
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            error!("update worker panicked; continuing without update");
            return UpdateOutcome::None;
        }
        outcome.unwrap_or(UpdateOutcome::None)
    }
}
