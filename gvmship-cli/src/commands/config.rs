//! `gvmship config` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use gvmship_core::config::GvmshipConfig;

use crate::cli::{ConfigAction, ConfigArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Placeholder shown instead of secrets.
const REDACTED: &str = "***REDACTED***";

/// Section names accepted by `config show --section`.
const SECTIONS: [&str; 6] = ["general", "server", "export", "output", "archive", "metrics"];

/// Execute the `config` command.
pub async fn execute(
    args: ConfigArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Validate => execute_validate(config_path, writer).await,
        ConfigAction::Show { section } => execute_show(config_path, section, writer).await,
    }
}

/// Load, validate and check that output directories exist.
async fn execute_validate(config_path: &Path, writer: &OutputWriter) -> Result<(), CliError> {
    info!(path = %config_path.display(), "validating configuration");

    let report = validate_report(config_path).await;
    writer.render(&report)?;

    if !report.valid {
        return Err(CliError::Config("configuration is invalid".to_owned()));
    }
    Ok(())
}

/// Build the validation report for `config_path`.
pub async fn validate_report(config_path: &Path) -> ConfigValidationReport {
    let result = match GvmshipConfig::load(config_path).await {
        Ok(config) => config.validate_paths(),
        Err(e) => Err(e),
    };

    ConfigValidationReport {
        source: config_path.display().to_string(),
        valid: result.is_ok(),
        errors: result.err().map(|e| e.to_string()).into_iter().collect(),
    }
}

async fn execute_show(
    config_path: &Path,
    section: Option<String>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    info!(path = %config_path.display(), "loading configuration");

    let config = GvmshipConfig::load(config_path).await?;
    let report = show_report(config, config_path, section.as_deref())?;
    writer.render(&report)
}

/// Render the effective configuration, optionally a single section.
pub fn show_report(
    mut config: GvmshipConfig,
    config_path: &Path,
    section: Option<&str>,
) -> Result<ConfigReport, CliError> {
    redact_credentials(&mut config);

    let config_toml = match section {
        None => toml::to_string_pretty(&config),
        Some("general") => toml::to_string_pretty(&config.general),
        Some("server") => toml::to_string_pretty(&config.server),
        Some("export") => toml::to_string_pretty(&config.export),
        Some("output") => toml::to_string_pretty(&config.output),
        Some("archive") => toml::to_string_pretty(&config.archive),
        Some("metrics") => toml::to_string_pretty(&config.metrics),
        Some(other) => {
            return Err(CliError::Command(format!(
                "unknown section: {} (expected: {})",
                other,
                SECTIONS.join(", ")
            )));
        }
    }
    .unwrap_or_else(|e| format!("(serialization error: {})", e));

    Ok(ConfigReport {
        source: config_path.display().to_string(),
        section: section.map(str::to_owned),
        config_toml,
    })
}

/// Hide the GMP password.
fn redact_credentials(config: &mut GvmshipConfig) {
    if !config.export.password.is_empty() {
        config.export.password = REDACTED.to_owned();
    }
}

/// Configuration display report.
///
/// `config_toml` is text-only; JSON output carries just the metadata.
#[derive(Debug, Serialize)]
pub struct ConfigReport {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(skip)]
    pub config_toml: String,
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if let Some(ref section) = self.section {
            let section_label = format!("[{}]", section);
            writeln!(
                w,
                "Configuration {} (source: {})",
                section_label.bold(),
                self.source
            )?;
        } else {
            writeln!(w, "Configuration (source: {})", self.source.bold())?;
        }

        writeln!(w)?;
        write!(w, "{}", self.config_toml)
    }
}

/// Configuration validation report.
#[derive(Debug, Serialize)]
pub struct ConfigValidationReport {
    pub source: String,
    pub valid: bool,
    pub errors: Vec<String>,
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Config Validation: {}", self.source.bold())?;

        if self.valid {
            writeln!(w, "  Result: {}", "VALID".green().bold())?;
        } else {
            writeln!(w, "  Result: {}", "INVALID".red().bold())?;
            for err in &self.errors {
                writeln!(w, "  Error: {}", err.red())?;
            }
        }
        Ok(())
    }
}
