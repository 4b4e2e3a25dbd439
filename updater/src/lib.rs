//! WSMR self-update pipeline.
//!
//! This crate discovers whether a newer client build exists, downloads it,
//! verifies its SHA-256 digest, installs it beside the running instance, and
//! hands control to the new version. Every failure is absorbed: the caller
//! always gets an [`pipeline::UpdateOutcome`] and continues starting the
//! application when no relaunch happened.
//!
//! # Modules
//!
//! - [`version`] - Dotted numeric version comparison
//! - [`http`] - HTTP transport seam and the `ureq` implementation
//! - [`metadata`] - Release descriptor retrieval and fail-soft parsing
//! - [`download`] - Streaming package download with throttled progress
//! - [`digest`] - SHA-256 digest newtype and artifact verification
//! - [`install`] - Flattening ZIP installer with staged moves
//! - [`relaunch`] - Launch candidate selection and process handoff
//! - [`pipeline`] - The update state machine
//! - [`worker`] - Background execution with a completion signal
//! - [`dirs`] - Cache and install directory resolution
//! - [`error`] - Pipeline error taxonomy
//! - [`output`] - Human-readable progress formatting

pub mod digest;
pub mod dirs;
pub mod download;
pub mod error;
pub mod http;
pub mod install;
pub mod metadata;
pub mod output;
pub mod pipeline;
pub mod relaunch;
pub mod version;
pub mod worker;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use pipeline::{UpdateOutcome, run_update_pipeline};
