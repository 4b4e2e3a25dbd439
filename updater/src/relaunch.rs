//! Handing control to a freshly installed client.
//!
//! After installation the install directory is scanned for a launchable file.
//! Candidates are ordered by file name so the choice never depends on
//! directory enumeration order; a name carrying the bundled marker (the
//! self-contained build, `app-all.jar` and friends) is preferred.
//!
//! Native candidates are executed directly. `.jar` candidates run through the
//! configured interpreter, falling back to `$JAVA_HOME/bin/java` and then
//! plain `java`. Once the child is up the current process exits immediately
//! through the [`Terminator`] seam.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};

/// Default delay between spawning the child and exiting.
pub const DEFAULT_RELAUNCH_GRACE: Duration = Duration::from_millis(250);

/// Which files may be launched and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPolicy {
    /// Launchable extensions, matched case-insensitively.
    pub extensions: Vec<String>,
    /// Substring marking the preferred bundled build.
    pub bundled_marker: String,
    /// Interpreter for `.jar` candidates; resolved from `JAVA_HOME` when unset.
    pub interpreter: Option<PathBuf>,
}

impl Default for LaunchPolicy {
    fn default() -> Self {
        Self {
            extensions: ["bin", "exe", "jar", "AppImage"]
                .into_iter()
                .map(String::from)
                .collect(),
            bundled_marker: "-all".to_owned(),
            interpreter: None,
        }
    }
}

impl LaunchPolicy {
    /// Whether `name` carries one of the launchable extensions.
    #[must_use]
    pub fn is_launchable(&self, name: &str) -> bool {
        extension_of(name).is_some_and(|ext| {
            self.extensions
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
    }
}

fn extension_of(name: &str) -> Option<&str> {
    Path::new(name).extension().and_then(|ext| ext.to_str())
}

/// Choose the launch candidate among `names`.
///
/// Names are sorted lexicographically; the first one containing the bundled
/// marker wins, otherwise the first launchable name.
///
/// # Examples
///
/// ```
/// use wsmr_updater::relaunch::{LaunchPolicy, select_candidate};
///
/// let names = ["app.bin", "app-all.bin", "README.md"];
/// let chosen = select_candidate(names.iter().copied(), &LaunchPolicy::default());
/// assert_eq!(chosen.as_deref(), Some("app-all.bin"));
/// ```
#[must_use]
pub fn select_candidate<'a>(
    names: impl IntoIterator<Item = &'a str>,
    policy: &LaunchPolicy,
) -> Option<String> {
    let mut launchable: Vec<&str> = names
        .into_iter()
        .filter(|name| policy.is_launchable(name))
        .collect();
    launchable.sort_unstable();

    let marker = policy.bundled_marker.as_str();
    launchable
        .iter()
        .find(|name| !marker.is_empty() && name.contains(marker))
        .or_else(|| launchable.first())
        .map(|name| (*name).to_owned())
}

/// Find the file to launch inside `dir`.
///
/// Only regular files with UTF-8 names are considered.
///
/// # Errors
///
/// Returns an I/O error when `dir` cannot be read.
pub fn find_launch_candidate(dir: &Path, policy: &LaunchPolicy) -> io::Result<Option<PathBuf>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Ok(name) = entry.file_name().into_string() {
            names.push(name);
        }
    }
    Ok(select_candidate(names.iter().map(String::as_str), policy).map(|name| dir.join(name)))
}

/// A fully resolved child process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    /// Executable to run.
    pub program: PathBuf,
    /// Arguments passed to the executable.
    pub args: Vec<OsString>,
    /// Working directory of the child.
    pub working_dir: PathBuf,
}

impl LaunchCommand {
    /// Build the invocation for `candidate`, reading `JAVA_HOME` from the
    /// environment.
    #[must_use]
    pub fn for_candidate(candidate: &Path, policy: &LaunchPolicy, working_dir: &Path) -> Self {
        let java_home = std::env::var_os("JAVA_HOME").map(PathBuf::from);
        Self::for_candidate_with(candidate, policy, working_dir, java_home.as_deref())
    }

    /// Build the invocation for `candidate` with an explicit `JAVA_HOME`.
    #[must_use]
    pub fn for_candidate_with(
        candidate: &Path,
        policy: &LaunchPolicy,
        working_dir: &Path,
        java_home: Option<&Path>,
    ) -> Self {
        let is_jar = candidate
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("jar"));
        if !is_jar {
            return Self {
                program: candidate.to_path_buf(),
                args: Vec::new(),
                working_dir: working_dir.to_path_buf(),
            };
        }

        let program = policy
            .interpreter
            .clone()
            .or_else(|| java_home.map(java_in))
            .unwrap_or_else(|| PathBuf::from("java"));
        Self {
            program,
            args: vec![OsString::from("-jar"), candidate.as_os_str().to_owned()],
            working_dir: working_dir.to_path_buf(),
        }
    }
}

fn java_in(java_home: &Path) -> PathBuf {
    let binary = if cfg!(windows) { "java.exe" } else { "java" };
    java_home.join("bin").join(binary)
}

/// Starts child processes.
#[cfg_attr(test, mockall::automock)]
pub trait ProcessSpawner {
    /// Spawn `command` detached from the caller, with inherited stdio.
    ///
    /// # Errors
    ///
    /// Returns the I/O error reported by the operating system.
    fn spawn(&self, command: &LaunchCommand) -> io::Result<()>;
}

/// Spawns processes on the host system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessSpawner;

impl ProcessSpawner for SystemProcessSpawner {
    fn spawn(&self, command: &LaunchCommand) -> io::Result<()> {
        let child = Command::new(&command.program)
            .args(&command.args)
            .current_dir(&command.working_dir)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()?;
        debug!("spawned child process {}", child.id());
        Ok(())
    }
}

/// Ends the current process after a successful handoff.
#[cfg_attr(test, mockall::automock)]
pub trait Terminator {
    /// Terminate the process. Production implementations never return.
    fn terminate(&self);
}

/// Exits the process with status 0 without running destructors.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessTerminator;

impl Terminator for ProcessTerminator {
    fn terminate(&self) {
        log::logger().flush();
        std::process::exit(0);
    }
}

/// Reasons a relaunch did not happen.
#[derive(Debug, thiserror::Error)]
pub enum RelaunchError {
    /// The install directory holds nothing launchable.
    #[error("no launchable file in {}", .dir.display())]
    NoCandidate {
        /// The directory that was scanned.
        dir: PathBuf,
    },

    /// The install directory could not be scanned.
    #[error("could not scan {}: {source}", .dir.display())]
    Scan {
        /// The directory that was scanned.
        dir: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },

    /// The child process failed to start.
    #[error("could not start {}: {source}", .program.display())]
    Spawn {
        /// The executable that was attempted.
        program: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },
}

/// Starts the installed client and terminates the current process.
pub struct ProcessRelauncher<'a> {
    install_dir: PathBuf,
    working_dir: PathBuf,
    policy: LaunchPolicy,
    grace: Duration,
    spawner: &'a dyn ProcessSpawner,
    terminator: &'a dyn Terminator,
}

impl<'a> ProcessRelauncher<'a> {
    /// Create a relauncher for `install_dir` using the given seams.
    #[must_use]
    pub fn new(
        install_dir: PathBuf,
        policy: LaunchPolicy,
        spawner: &'a dyn ProcessSpawner,
        terminator: &'a dyn Terminator,
    ) -> Self {
        let working_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            install_dir,
            working_dir,
            policy,
            grace: DEFAULT_RELAUNCH_GRACE,
            spawner,
            terminator,
        }
    }

    /// Override the child's working directory.
    #[must_use]
    pub fn with_working_dir(mut self, working_dir: PathBuf) -> Self {
        self.working_dir = working_dir;
        self
    }

    /// Override the delay between spawning and terminating.
    #[must_use]
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Resolve the child invocation without starting it.
    ///
    /// # Errors
    ///
    /// Returns [`RelaunchError::Scan`] or [`RelaunchError::NoCandidate`].
    pub fn plan(&self) -> Result<LaunchCommand, RelaunchError> {
        let candidate = find_launch_candidate(&self.install_dir, &self.policy)
            .map_err(|source| RelaunchError::Scan {
                dir: self.install_dir.clone(),
                source,
            })?
            .ok_or_else(|| RelaunchError::NoCandidate {
                dir: self.install_dir.clone(),
            })?;
        Ok(LaunchCommand::for_candidate(
            &candidate,
            &self.policy,
            &self.working_dir,
        ))
    }

    /// Spawn the installed client.
    ///
    /// # Errors
    ///
    /// Returns [`RelaunchError`] when nothing can be launched or the spawn
    /// fails.
    pub fn spawn(&self) -> Result<LaunchCommand, RelaunchError> {
        let command = self.plan()?;
        info!(
            "relaunching {} {:?}",
            command.program.display(),
            command.args
        );
        self.spawner
            .spawn(&command)
            .map_err(|source| RelaunchError::Spawn {
                program: command.program.clone(),
                source,
            })?;
        Ok(command)
    }

    /// Wait out the grace delay, flush logs and terminate this process.
    pub fn hand_off(&self) {
        thread::sleep(self.grace);
        log::logger().flush();
        self.terminator.terminate();
    }

    /// Spawn the installed client and terminate this process.
    ///
    /// Returns `false` when no child was started. With a production
    /// [`Terminator`] a successful call never returns.
    pub fn relaunch_if_possible(&self) -> bool {
        match self.spawn() {
            Ok(_) => {
                self.hand_off();
                true
            }
            Err(e) => {
                warn!("relaunch skipped: {e}");
                false
            }
        }
    }
}
