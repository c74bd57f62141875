//! `gvmship reload` command handler

use std::path::Path;
use std::time::Duration;

use tracing::{info, warn};

use gvmship_core::config::GvmshipConfig;

use crate::cli::{ReloadArgs, StartArgs};
use crate::commands::{start, stop};
use crate::error::CliError;
use crate::output::OutputWriter;
use crate::pid;

/// Execute the `reload` command.
///
/// A daemon that is not running is simply started.
pub async fn execute(
    args: ReloadArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = GvmshipConfig::load(config_path).await?;
    stop_and_wait(&config, Duration::from_secs(args.timeout), writer).await?;

    start::execute(
        StartArgs {
            daemonize: true,
            pid_file: None,
        },
        config_path,
    )
    .await
}

/// Stop the daemon named by the PID file and wait for the process to go away.
pub async fn stop_and_wait(
    config: &GvmshipConfig,
    timeout: Duration,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let report = match stop::stop_daemon(config) {
        Ok(report) => report,
        Err(CliError::DaemonUnavailable(reason)) => {
            warn!(%reason, "daemon was not running");
            return Ok(());
        }
        Err(e) => return Err(e),
    };
    writer.render(&report)?;

    if !pid::wait_for_exit(report.pid, timeout).await {
        return Err(CliError::Command(format!(
            "daemon (pid {}) did not exit within {}s",
            report.pid,
            timeout.as_secs()
        )));
    }
    info!(pid = report.pid, "previous daemon exited");
    Ok(())
}
