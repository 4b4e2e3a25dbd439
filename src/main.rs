//! WSMR bootstrap entrypoint.
//!
//! Runs the self-update preflight, then reports how start-up proceeds. A
//! successful relaunch never returns here; the new client has taken over.

use clap::Parser;
use log::info;
use std::io::Write;
use wsmr::cli::Cli;
use wsmr::config::UpdaterSettings;
use wsmr::logging;
use wsmr::startup::{
    OverrideDirs, StartupError, StderrReporter, apply_overrides, current_version,
    outcome_message, probe, run_preflight,
};
use wsmr_updater::http::UreqTransport;
use wsmr_updater::output::write_stderr_line;
use wsmr_updater::pipeline::{NoopObserver, UpdateObserver, USER_AGENT};

fn main() {
    let cli = Cli::parse();
    logging::init(cli.common.verbosity, cli.common.quiet);

    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli, stderr: &mut dyn Write) -> Result<(), StartupError> {
    let mut settings = UpdaterSettings::load(cli.common.config.as_deref());
    apply_overrides(&mut settings, cli);
    let config = settings.pipeline_config();
    let dirs = OverrideDirs::new(cli.common.cache_dir.clone(), cli.common.install_dir.clone());
    let version = current_version();

    if cli.is_probe() {
        let transport = UreqTransport::with_user_agent(USER_AGENT);
        let mut stdout = std::io::stdout().lock();
        probe(&transport, &dirs, &config, &version, &mut stdout)?;
        return Ok(());
    }

    if cli.run_args().skip_update {
        info!("update check skipped");
    } else {
        let observer: Box<dyn UpdateObserver + Send> = if cli.common.quiet {
            Box::new(NoopObserver)
        } else {
            Box::new(StderrReporter::new(std::io::stderr()))
        };
        let outcome = run_preflight(&version, config, Box::new(dirs), observer);
        if !cli.common.quiet {
            write_stderr_line(stderr, outcome_message(outcome));
        }
    }

    info!("starting WSMR {version}");
    Ok(())
}

fn exit_code_for_run_result(result: Result<(), StartupError>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(stderr, err);
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_for_run_result_returns_zero_on_success() {
        let mut stderr = Vec::new();
        let exit_code = exit_code_for_run_result(Ok(()), &mut stderr);
        assert_eq!(exit_code, 0);
        assert!(stderr.is_empty());
    }

    #[test]
    fn exit_code_for_run_result_prints_error_and_returns_one() {
        let err = StartupError::MetadataUnavailable {
            reason: "HTTP 404".to_owned(),
        };

        let mut stderr = Vec::new();
        let exit_code = exit_code_for_run_result(Err(err), &mut stderr);
        assert_eq!(exit_code, 1);

        let stderr_text = String::from_utf8(stderr).expect("stderr was not UTF-8");
        assert!(stderr_text.contains("release metadata unavailable: HTTP 404"));
    }
}
