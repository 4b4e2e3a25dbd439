//! CLI argument definitions for the WSMR bootstrap.
//!
//! Kept apart from the entrypoint so the parsing rules can be tested
//! directly.

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// Start the WSMR desktop client, updating it first when a release is out.
#[derive(Parser, Debug)]
#[command(name = "wsmr")]
#[command(version, about)]
#[command(long_about = concat!(
    "Start the WSMR desktop client.\n\n",
    "Before start-up the release descriptor is fetched and compared with the ",
    "running version. Newer packages are downloaded, verified against their ",
    "published SHA-256, installed and relaunched. Any failure falls back to ",
    "starting the current installation.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Check for updates and start:\n",
    "    $ wsmr\n\n",
    "  Start without contacting the update server:\n",
    "    $ wsmr --skip-update\n\n",
    "  Inspect what the update server publishes:\n",
    "    $ wsmr probe\n\n",
    "ENVIRONMENT:\n",
    "  WSMR_LOG                Log filter (e.g. debug, wsmr_updater=trace)\n",
    "  WSMR_VERSION_OVERRIDE   Pretend to run this client version",
))]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Options shared by every subcommand.
    #[command(flatten)]
    pub common: CommonArgs,

    /// Start-up arguments (used when no subcommand is given).
    #[command(flatten)]
    pub run: RunArgs,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the update preflight and start (default when no subcommand given).
    Run(RunArgs),

    /// Fetch the release descriptor and report the update decision.
    Probe,
}

/// Options accepted before or after any subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    /// Settings file [default: wsmr.toml in the working directory].
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Override the release descriptor URL.
    #[arg(long, value_name = "URL", global = true)]
    pub update_url: Option<String>,

    /// Directory for the cached descriptor and archive [default: platform-specific].
    #[arg(long, value_name = "DIR", global = true)]
    pub cache_dir: Option<Utf8PathBuf>,

    /// Directory holding the client installation [default: platform-specific].
    #[arg(long, value_name = "DIR", global = true)]
    pub install_dir: Option<Utf8PathBuf>,

    /// Increase log verbosity (repeatable: -v, -vv).
    #[arg(
        short,
        long = "verbose",
        action = clap::ArgAction::Count,
        conflicts_with = "quiet",
        global = true
    )]
    pub verbosity: u8,

    /// Only log warnings and errors; suppress progress output.
    #[arg(short, long, conflicts_with = "verbosity", global = true)]
    pub quiet: bool,
}

/// Arguments for the default start-up command.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Start without checking for updates.
    #[arg(long)]
    pub skip_update: bool,

    /// Install updates but keep running the current process.
    #[arg(long)]
    pub no_relaunch: bool,
}

impl Cli {
    /// Start-up arguments, whether given at top level or after `run`.
    ///
    /// # Examples
    ///
    /// ```
    /// use clap::Parser;
    /// use wsmr::cli::Cli;
    ///
    /// let cli = Cli::parse_from(["wsmr", "run", "--skip-update"]);
    /// assert!(cli.run_args().skip_update);
    ///
    /// let cli = Cli::parse_from(["wsmr", "--no-relaunch"]);
    /// assert!(cli.run_args().no_relaunch);
    /// ```
    #[must_use]
    pub fn run_args(&self) -> &RunArgs {
        match &self.command {
            Some(Command::Run(args)) => args,
            Some(Command::Probe) | None => &self.run,
        }
    }

    /// Whether the probe subcommand was requested.
    #[must_use]
    pub fn is_probe(&self) -> bool {
        matches!(self.command, Some(Command::Probe))
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
