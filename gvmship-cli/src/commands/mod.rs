//! Command handlers -- one module per subcommand

pub mod archive;
pub mod config;
pub mod reload;
pub mod script;
pub mod ship;
pub mod start;
pub mod status;
pub mod stop;

use std::path::Path;

use crate::cli::Commands;
use crate::error::CliError;
use crate::output::OutputWriter;

/// Route a parsed subcommand to its handler.
pub async fn dispatch(
    command: Commands,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match command {
        Commands::Ship(args) => ship::execute(args, config_path, writer).await,
        Commands::Archive(args) => archive::execute(args, config_path, writer).await,
        Commands::Start(args) => start::execute(args, config_path).await,
        Commands::Stop => stop::execute(config_path, writer).await,
        Commands::Reload(args) => reload::execute(args, config_path, writer).await,
        Commands::Status => status::execute(config_path, writer).await,
        Commands::Script(args) => script::execute(args, config_path, writer).await,
        Commands::Config(args) => config::execute(args, config_path, writer).await,
    }
}
