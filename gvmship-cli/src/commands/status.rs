//! `gvmship status` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use gvmship_core::config::GvmshipConfig;

use crate::error::CliError;
use crate::output::{OutputWriter, Render};
use crate::pid;

/// Execute the `status` command.
pub async fn execute(config_path: &Path, writer: &OutputWriter) -> Result<(), CliError> {
    let config = GvmshipConfig::load(config_path).await?;
    let report = build_status_report(&config)?;
    writer.render(&report)
}

/// Inspect the PID file named in `config`.
pub fn build_status_report(config: &GvmshipConfig) -> Result<StatusReport, CliError> {
    let pid = if config.general.pid_file.is_empty() {
        None
    } else {
        pid::read_pid(Path::new(&config.general.pid_file))?
    };
    let running = pid.is_some_and(pid::is_process_alive);

    Ok(StatusReport {
        daemon_running: running,
        pid,
        pid_file: config.general.pid_file.clone(),
        endpoint: format!("http://{}:{}/", config.server.host, config.server.port),
        cumulative_log: config.output.cumulative_log_path.clone(),
    })
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub daemon_running: bool,
    pub pid: Option<u32>,
    pub pid_file: String,
    pub endpoint: String,
    pub cumulative_log: String,
}

impl Render for StatusReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        match (self.daemon_running, self.pid) {
            (true, Some(pid)) => writeln!(w, "Daemon: {} (pid {})", "running".green().bold(), pid)?,
            (false, Some(pid)) => writeln!(
                w,
                "Daemon: {} (stale PID file, pid {})",
                "not running".red().bold(),
                pid
            )?,
            _ => writeln!(w, "Daemon: {}", "not running".red().bold())?,
        }
        writeln!(w, "  PID file:   {}", self.pid_file)?;
        writeln!(w, "  Endpoint:   {}", self.endpoint)?;
        writeln!(w, "  Cumulative: {}", self.cumulative_log)
    }
}
