//! Tracing setup for gvmship-daemon.
//!
//! `[general] log_level` applies to the gvmship crates only; the HTTP and
//! runtime dependencies stay at `warn`. `RUST_LOG` replaces the whole filter
//! when set.

use anyhow::{Context, Result, bail};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use gvmship_core::config::GeneralConfig;

/// Crates whose events follow the configured level.
const OWN_TARGETS: &[&str] = &["gvmship_daemon", "gvmship_report", "gvmship_core"];

/// Level for everything else.
const DEPENDENCY_LEVEL: &str = "warn";

/// Output layout selected by `[general] log_format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line, for log shippers.
    Json,
    /// Multi-line human-readable output.
    Pretty,
}

impl LogFormat {
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => bail!("unknown log format '{other}', expected 'json' or 'pretty'"),
        }
    }
}

/// Filter directives for `level`, e.g. `warn,gvmship_daemon=info,...`.
pub fn filter_directives(level: &str) -> String {
    let mut directives = DEPENDENCY_LEVEL.to_owned();
    for target in OWN_TARGETS {
        directives.push_str(&format!(",{target}={level}"));
    }
    directives
}

fn build_filter(level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(filter_directives(level))
        .with_context(|| format!("invalid log level '{level}'"))
}

/// Install the global subscriber. Call once, before the orchestrator is built.
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let format = LogFormat::parse(&config.log_format)?;
    let filter = build_filter(&config.log_level)?;
    let registry = tracing_subscriber::registry().with(filter);

    let result = match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty().with_target(false))
            .try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("failed to initialize {format:?} tracing subscriber: {e}"))
}
