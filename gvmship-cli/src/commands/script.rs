//! `gvmship script` command handler

use std::io::Write;
use std::path::Path;

use gvmship_core::config::GvmshipConfig;
use gvmship_report::{GvmScriptExporter, ScriptOutput};

use crate::cli::ScriptArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `script` command. Output is shown even when the script fails.
pub async fn execute(
    args: ScriptArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = GvmshipConfig::load(config_path).await?;
    let output = run_script(&config, &args.name, &args.args).await?;
    writer.render(&output)?;

    if output.success() {
        Ok(())
    } else {
        Err(CliError::Command(format!(
            "script '{}' failed with {}",
            args.name,
            output
                .exit_code
                .map_or_else(|| "a signal".to_owned(), |c| format!("exit code {c}"))
        )))
    }
}

/// Run `name` with the `[export]` credentials and connection.
pub async fn run_script(
    config: &GvmshipConfig,
    name: &str,
    args: &[String],
) -> Result<ScriptOutput, CliError> {
    let exporter = GvmScriptExporter::from_config(&config.export);
    Ok(exporter.run_script(name, args).await?)
}

impl Render for ScriptOutput {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(w, "Standard Output:")?;
        writeln!(w, "{}", self.stdout.trim_end())?;
        writeln!(w, "Standard Error:")?;
        writeln!(w, "{}", self.stderr.trim_end())
    }
}
