//! CLI argument parsing using clap derive API
//!
//! Purely declarative; no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// gvmship -- ship GVM/OpenVAS scan reports into a cumulative event log.
///
/// Use `gvmship <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "gvmship", version, about, long_about = None)]
pub struct Cli {
    /// Path to the gvmship.toml configuration file.
    #[arg(short, long, global = true, default_value = "/etc/gvmship/gvmship.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export the latest report and ship it once.
    Ship(ShipArgs),

    /// Copy the cumulative log to a dated archive and truncate it.
    Archive(ArchiveArgs),

    /// Start the gvmship daemon.
    Start(StartArgs),

    /// Stop a running daemon (SIGTERM via its PID file).
    Stop,

    /// Stop the daemon, wait for it to exit, and start it again detached.
    Reload(ReloadArgs),

    /// Show whether the daemon is running.
    Status,

    /// Run a GMP script from the scripts directory through gvm-script.
    Script(ScriptArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- ship ----

/// One synchronous export-and-ship run.
#[derive(Args, Debug)]
pub struct ShipArgs {
    /// Write this run's records to PATH instead of the configured staging file.
    #[arg(long)]
    pub staging: Option<PathBuf>,
}

// ---- archive ----

/// Rotate the cumulative log.
#[derive(Args, Debug)]
pub struct ArchiveArgs {
    /// Override the archive directory.
    #[arg(long)]
    pub archive_dir: Option<PathBuf>,
}

// ---- start ----

/// Start the gvmship daemon.
#[derive(Args, Debug)]
pub struct StartArgs {
    /// Run as a background daemon (default: foreground).
    #[arg(short = 'd', long)]
    pub daemonize: bool,

    /// Override PID file location.
    #[arg(long)]
    pub pid_file: Option<PathBuf>,
}

// ---- reload ----

/// Restart the daemon.
#[derive(Args, Debug)]
pub struct ReloadArgs {
    /// Seconds to wait for the old daemon to exit.
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,
}

// ---- script ----

/// Run an arbitrary GMP script with the configured credentials.
#[derive(Args, Debug)]
pub struct ScriptArgs {
    /// Script file name, relative to the directory of `export.script_path`.
    pub name: String,

    /// Arguments passed to the script unchanged.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

// ---- config ----

/// Manage gvmship configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only one section (general, server, export, output, archive, metrics).
        #[arg(long)]
        section: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_ship_defaults() {
        let cli = Cli::try_parse_from(["gvmship", "ship"]).expect("parse");
        assert_eq!(cli.config, PathBuf::from("/etc/gvmship/gvmship.toml"));
        assert_eq!(cli.output, OutputFormat::Text);
        match cli.command {
            Commands::Ship(args) => assert!(args.staging.is_none()),
            other => panic!("expected Ship, got {other:?}"),
        }
    }

    #[test]
    fn parse_ship_with_staging() {
        let cli =
            Cli::try_parse_from(["gvmship", "ship", "--staging", "/tmp/temp"]).expect("parse");
        match cli.command {
            Commands::Ship(args) => assert_eq!(args.staging, Some(PathBuf::from("/tmp/temp"))),
            other => panic!("expected Ship, got {other:?}"),
        }
    }

    #[test]
    fn parse_archive_with_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "gvmship",
            "archive",
            "--output",
            "json",
            "-c",
            "/tmp/g.toml",
        ])
        .expect("parse");
        assert_eq!(cli.output, OutputFormat::Json);
        assert_eq!(cli.config, PathBuf::from("/tmp/g.toml"));
        assert!(matches!(cli.command, Commands::Archive(_)));
    }

    #[test]
    fn parse_start_daemonize() {
        let cli = Cli::try_parse_from(["gvmship", "start", "-d", "--pid-file", "/tmp/g.pid"])
            .expect("parse");
        match cli.command {
            Commands::Start(args) => {
                assert!(args.daemonize);
                assert_eq!(args.pid_file, Some(PathBuf::from("/tmp/g.pid")));
            }
            other => panic!("expected Start, got {other:?}"),
        }
    }

    #[test]
    fn parse_reload_default_timeout() {
        let cli = Cli::try_parse_from(["gvmship", "reload"]).expect("parse");
        match cli.command {
            Commands::Reload(args) => assert_eq!(args.timeout, 30),
            other => panic!("expected Reload, got {other:?}"),
        }
    }

    #[test]
    fn parse_script_passes_hyphenated_args() {
        let cli = Cli::try_parse_from([
            "gvmship",
            "script",
            "list-tasks.gmp.py",
            "--filter",
            "name=weekly",
        ])
        .expect("parse");
        match cli.command {
            Commands::Script(args) => {
                assert_eq!(args.name, "list-tasks.gmp.py");
                assert_eq!(args.args, vec!["--filter", "name=weekly"]);
            }
            other => panic!("expected Script, got {other:?}"),
        }
    }

    #[test]
    fn parse_config_show_section() {
        let cli =
            Cli::try_parse_from(["gvmship", "config", "show", "--section", "export"]).expect("parse");
        match cli.command {
            Commands::Config(ConfigArgs {
                action: ConfigAction::Show { section },
            }) => assert_eq!(section.as_deref(), Some("export")),
            other => panic!("expected config show, got {other:?}"),
        }
    }

    #[test]
    fn unknown_output_format_is_rejected() {
        assert!(Cli::try_parse_from(["gvmship", "status", "--output", "yaml"]).is_err());
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["gvmship"]).is_err());
    }
}
