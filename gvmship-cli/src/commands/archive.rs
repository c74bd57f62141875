//! `gvmship archive` command handler
//!
//! Intended to run from cron while the daemon keeps appending; the rotator
//! takes the same `flock` the daemon's writer holds, so a batch is never
//! split across the archive and the truncated log.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use gvmship_core::config::GvmshipConfig;
use gvmship_report::{ArchiveRotator, LogFile, RotationOutcome};

use crate::cli::ArchiveArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `archive` command.
pub async fn execute(
    args: ArchiveArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = GvmshipConfig::load(config_path).await?;
    let report = rotate_once(&config, args.archive_dir).await?;
    writer.render(&report)
}

/// Rotate the configured cumulative log once.
pub async fn rotate_once(
    config: &GvmshipConfig,
    archive_dir: Option<PathBuf>,
) -> Result<ArchiveReport, CliError> {
    let archive_dir = archive_dir.unwrap_or_else(|| PathBuf::from(&config.archive.archive_dir));
    let rotator = ArchiveRotator::new(&archive_dir);
    let log = LogFile::new(&config.output.cumulative_log_path);

    let outcome = rotator.rotate(&log).await?;

    Ok(ArchiveReport {
        archive_dir: archive_dir.display().to_string(),
        outcome,
    })
}

/// Rotation result.
#[derive(Debug, Serialize)]
pub struct ArchiveReport {
    pub archive_dir: String,
    #[serde(flatten)]
    pub outcome: RotationOutcome,
}

impl Render for ArchiveReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        match &self.outcome {
            RotationOutcome::Archived {
                archive_path,
                bytes,
            } => {
                writeln!(w, "Archive: {}", "ARCHIVED".green().bold())?;
                writeln!(w, "  File:  {}", archive_path.display())?;
                writeln!(w, "  Bytes: {}", bytes)
            }
            RotationOutcome::Noop { log_path } => {
                writeln!(w, "Archive: {}", "NOTHING TO DO".yellow().bold())?;
                writeln!(w, "  No scans file found at {}", log_path.display())
            }
        }
    }
}
