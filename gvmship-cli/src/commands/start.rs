//! `gvmship start` command handler

use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{info, warn};

use gvmship_core::config::GvmshipConfig;

use crate::cli::StartArgs;
use crate::error::CliError;
use crate::pid;

/// Daemon binary looked up on `PATH`.
const DAEMON_BIN: &str = "gvmship-daemon";

/// Execute the `start` command.
///
/// Foreground mode replaces the current process with `gvmship-daemon`;
/// `-d` spawns it detached and checks it survives startup.
pub async fn execute(args: StartArgs, config_path: &Path) -> Result<(), CliError> {
    let config = GvmshipConfig::load(config_path).await?;

    let pid_file = args
        .pid_file
        .as_deref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| config.general.pid_file.clone());
    if !pid_file.is_empty() {
        clear_stale_pid_file(Path::new(&pid_file))?;
    }

    info!(
        daemonize = args.daemonize,
        config = %config_path.display(),
        "starting gvmship-daemon"
    );

    let mut cmd = Command::new(DAEMON_BIN);
    cmd.arg("--config").arg(config_path);
    if let Some(path) = &args.pid_file {
        cmd.arg("--pid-file").arg(path);
    }

    if args.daemonize {
        start_detached(cmd)
    } else {
        start_foreground(cmd)
    }
}

/// Refuse to start over a live daemon; remove a PID file left by a dead one.
///
/// The daemon creates its PID file exclusively, so any leftover file would
/// make it exit at startup.
pub fn clear_stale_pid_file(path: &Path) -> Result<(), CliError> {
    match pid::read_pid(path)? {
        Some(existing) if pid::is_process_alive(existing) => Err(CliError::Command(format!(
            "daemon already running with PID {existing} ({})",
            path.display()
        ))),
        Some(existing) => {
            warn!(pid = existing, path = %path.display(), "removing stale PID file");
            pid::remove_pid_file(path)?;
            Ok(())
        }
        None => {
            if path.exists() {
                warn!(path = %path.display(), "removing unreadable PID file");
                pid::remove_pid_file(path)?;
            }
            Ok(())
        }
    }
}

/// Replace the current process with the daemon (`exec(2)`).
#[cfg(unix)]
fn start_foreground(mut cmd: Command) -> Result<(), CliError> {
    use std::os::unix::process::CommandExt;

    let err = cmd.exec();
    Err(CliError::Command(format!(
        "failed to execute {DAEMON_BIN}: {err}"
    )))
}

#[cfg(not(unix))]
fn start_foreground(mut cmd: Command) -> Result<(), CliError> {
    let status = cmd
        .status()
        .map_err(|e| CliError::Command(format!("failed to execute {DAEMON_BIN}: {e}")))?;
    if status.success() {
        Ok(())
    } else {
        Err(CliError::Command(format!("{DAEMON_BIN} exited with {status}")))
    }
}

/// Spawn the daemon with stdio detached and fail if it exits within 200ms.
fn start_detached(mut cmd: Command) -> Result<(), CliError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    let mut child = cmd
        .spawn()
        .map_err(|e| CliError::Command(format!("failed to spawn {DAEMON_BIN}: {e}")))?;
    let pid = child.id();
    info!(pid, "daemon spawned, verifying startup");

    std::thread::sleep(std::time::Duration::from_millis(200));

    match child.try_wait() {
        Ok(Some(status)) => Err(CliError::Command(format!(
            "daemon exited immediately with status: {status}"
        ))),
        Ok(None) => {
            info!(pid, "daemon started");
            println!("gvmship-daemon started with PID {pid}");
            Ok(())
        }
        Err(e) => Err(CliError::Command(format!(
            "failed to check daemon status: {e}"
        ))),
    }
}
