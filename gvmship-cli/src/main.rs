use clap::Parser;
use tracing_subscriber::EnvFilter;

use gvmship_cli::cli::Cli;
use gvmship_cli::commands;
use gvmship_cli::output::OutputWriter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so `--output json` stays machine-readable.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_deref().unwrap_or("info")));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let writer = OutputWriter::new(cli.output);
    if let Err(e) = commands::dispatch(cli.command, &cli.config, &writer).await {
        eprintln!("error: {e}");
        std::process::exit(e.exit_code());
    }
}
