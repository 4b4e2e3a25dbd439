//! WSMR client bootstrap.
//!
//! The `wsmr` binary runs the self-update preflight before the client starts.
//! This library holds the pieces the binary wires together so they can be
//! tested without spawning processes.
//!
//! # Modules
//!
//! - [`cli`] - Command-line argument definitions
//! - [`config`] - `wsmr.toml` settings with fail-soft loading
//! - [`logging`] - Log subscriber initialisation
//! - [`startup`] - Update preflight, probe command and progress reporting

pub mod cli;
pub mod config;
pub mod logging;
pub mod startup;

pub use config::UpdaterSettings;
