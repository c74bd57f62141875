//! `gvmship ship` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use gvmship_core::config::GvmshipConfig;
use gvmship_report::{Exporter, LogFile, RunReport, ShipConfig, ShipOrchestrator};

use crate::cli::ShipArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `ship` command.
pub async fn execute(
    args: ShipArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = GvmshipConfig::load(config_path).await?;
    let summary = run_once(&config, args.staging.as_deref()).await?;
    writer.render(&summary)
}

/// Build the pipeline from `config` and run it once.
///
/// # Errors
///
/// - `CliError::Core` when an output directory does not exist
/// - `CliError::Ship` when the run fails
pub async fn run_once(
    config: &GvmshipConfig,
    staging_override: Option<&Path>,
) -> Result<ShipSummary, CliError> {
    config.validate_paths()?;

    let exporter = Exporter::from_config(&config.export)?;
    let orchestrator = ShipOrchestrator::builder()
        .config(ShipConfig::from_core(config))
        .exporter(exporter)
        .build()?;

    let staging = match staging_override {
        Some(path) => LogFile::new(path),
        None => orchestrator.staging().clone(),
    };
    info!(staging = %staging.path().display(), "running one-shot ship");

    let run = orchestrator.run(&staging).await?;

    Ok(ShipSummary {
        staging: staging.path().display().to_string(),
        cumulative_log: orchestrator.cumulative_log().path().display().to_string(),
        run,
    })
}

/// Result of a one-shot run.
#[derive(Debug, Serialize)]
pub struct ShipSummary {
    /// Staging file written by this run
    pub staging: String,
    /// Cumulative log appended to
    pub cumulative_log: String,
    #[serde(flatten)]
    pub run: RunReport,
}

impl Render for ShipSummary {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Ship run {}", self.run.run_id.bold())?;
        writeln!(w, "  Result:     {}", "OK".green().bold())?;
        writeln!(w, "  Export:     {}", self.run.export_file.display())?;
        writeln!(w, "  Rows:       {}", self.run.rows)?;
        writeln!(w, "  Records:    {}", self.run.records)?;
        writeln!(w, "  Bytes:      {}", self.run.bytes)?;
        writeln!(w, "  Staging:    {}", self.staging)?;
        writeln!(w, "  Cumulative: {}", self.cumulative_log)?;
        writeln!(w, "  Duration:   {}ms", self.run.duration.as_millis())
    }
}
