//! `gvmship stop` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use gvmship_core::config::GvmshipConfig;

use crate::error::CliError;
use crate::output::{OutputWriter, Render};
use crate::pid;

/// Execute the `stop` command.
///
/// Sends SIGTERM to the PID recorded in the PID file. The daemon removes its
/// own PID file once it has drained; a PID file whose process is gone is
/// removed here.
pub async fn execute(config_path: &Path, writer: &OutputWriter) -> Result<(), CliError> {
    let config = GvmshipConfig::load(config_path).await?;
    let report = stop_daemon(&config)?;
    writer.render(&report)
}

/// Signal the daemon named by `config.general.pid_file`.
pub fn stop_daemon(config: &GvmshipConfig) -> Result<StopReport, CliError> {
    if config.general.pid_file.is_empty() {
        return Err(CliError::Config(
            "general.pid_file is empty; cannot locate the daemon".to_owned(),
        ));
    }
    let pid_path = Path::new(&config.general.pid_file);

    let Some(pid) = pid::read_pid(pid_path)? else {
        return Err(CliError::DaemonUnavailable(format!(
            "no PID file at {}",
            pid_path.display()
        )));
    };

    if !pid::is_process_alive(pid) {
        warn!(pid, path = %pid_path.display(), "removing stale PID file");
        pid::remove_pid_file(pid_path)?;
        return Err(CliError::DaemonUnavailable(format!(
            "process {pid} is not running (stale PID file removed)"
        )));
    }

    pid::terminate(pid)
        .map_err(|e| CliError::Command(format!("failed to signal process {pid}: {e}")))?;
    info!(pid, "SIGTERM sent to daemon");

    Ok(StopReport {
        pid,
        signal: "SIGTERM",
    })
}

#[derive(Debug, Serialize)]
pub struct StopReport {
    pub pid: u32,
    pub signal: &'static str,
}

impl Render for StopReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(w, "Sent {} to daemon (pid {})", self.signal, self.pid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_pid_file(path: &Path) -> GvmshipConfig {
        let mut config = GvmshipConfig::default();
        config.general.pid_file = path.display().to_string();
        config
    }

    #[test]
    fn missing_pid_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_pid_file(&dir.path().join("gvmship.pid"));
        let err = stop_daemon(&config).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn empty_pid_file_setting_is_config_error() {
        let mut config = GvmshipConfig::default();
        config.general.pid_file = String::new();
        assert_eq!(stop_daemon(&config).unwrap_err().exit_code(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn stale_pid_file_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gvmship.pid");

        // a reaped child's PID is not alive
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();
        std::fs::write(&path, pid.to_string()).unwrap();

        let err = stop_daemon(&config_with_pid_file(&path)).unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert!(!path.exists());
    }
}
