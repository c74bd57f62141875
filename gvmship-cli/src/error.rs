//! CLI-specific error types and exit code mapping

use gvmship_core::error::GvmshipError;
use gvmship_report::ShipError;

/// CLI-specific error type.
///
/// `exit_code()` maps each variant to a process exit code.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// The daemon is not running (for `stop`).
    #[error("daemon not running: {0}")]
    DaemonUnavailable(String),

    /// A ship run or rotation failed.
    #[error("ship error: {0}")]
    Ship(#[from] ShipError),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from gvmship-core.
    #[error("{0}")]
    Core(#[from] GvmshipError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                 |
    /// |------|-------------------------|
    /// | 0    | Success                 |
    /// | 1    | Command or ship failure |
    /// | 2    | Configuration error     |
    /// | 3    | Daemon not running      |
    /// | 10   | IO error                |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Core(GvmshipError::Config(_)) => 2,
            Self::DaemonUnavailable(_) => 3,
            Self::Io(_) => 10,
            Self::Ship(_) | Self::JsonSerialize(_) | Self::Command(_) | Self::Core(_) => 1,
        }
    }
}
