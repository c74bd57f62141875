//! Daemon assembly and lifecycle.
//!
//! The [`Orchestrator`] loads configuration, builds the ship pipeline and
//! its single-flight queue once at startup, serves the trigger endpoint and
//! shuts everything down in order.
//!
//! # Shutdown Order
//!
//! 1. Stop accepting HTTP connections (in-flight requests finish)
//! 2. Close the ship queue and drain queued runs
//! 3. Stop background tasks, remove the PID file

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use gvmship_core::config::GvmshipConfig;
use gvmship_report::{Exporter, LogFile, ShipConfig, ShipOrchestrator};

use crate::allowlist::AllowList;
use crate::metrics_server;
use crate::queue::ShipQueue;
use crate::server::{self, AppState};

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: GvmshipConfig,
    /// Pipeline shared by every triggered run.
    ship: Arc<ShipOrchestrator<Exporter>>,
    /// Single-flight queue in front of `ship`.
    queue: Arc<ShipQueue>,
    /// Caller gate, `None` when disabled.
    allowlist: Option<AllowList>,
    /// Shutdown broadcast for background tasks.
    shutdown_tx: broadcast::Sender<()>,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl Orchestrator {
    /// Load configuration and build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read, parsed or validated
    /// - Output directories do not exist
    /// - The ship pipeline cannot be assembled
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = GvmshipConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config).await
    }

    /// Build from an already-loaded configuration.
    pub async fn build_from_config(config: GvmshipConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;
        config
            .validate_paths()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
        }

        let exporter = Exporter::from_config(&config.export)
            .map_err(|e| anyhow::anyhow!("failed to build exporter: {}", e))?;
        let ship_config = ShipConfig::from_core(&config);
        let cumulative = LogFile::new(&ship_config.cumulative_log_path);
        let ship = ShipOrchestrator::builder()
            .config(ship_config)
            .exporter(exporter)
            .cumulative_log(cumulative)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build ship orchestrator: {}", e))?;
        let ship = Arc::new(ship);

        let queue = Arc::new(ShipQueue::spawn(
            Arc::clone(&ship),
            config.server.queue_capacity,
        ));

        let allowlist = if config.server.allowlist_enabled {
            Some(AllowList::load(Path::new(&config.server.allowlist_path)).await)
        } else {
            tracing::warn!("caller allow-list disabled; any peer may trigger a run");
            None
        };

        let (shutdown_tx, _) = broadcast::channel(4);

        if config.metrics.enabled {
            record_daemon_metrics();
        }

        tracing::info!(
            export_mode = %config.export.mode,
            cumulative_log = %config.output.cumulative_log_path,
            queue_capacity = config.server.queue_capacity,
            "orchestrator initialized"
        );

        Ok(Self {
            config,
            ship,
            queue,
            allowlist,
            shutdown_tx,
            start_time: Instant::now(),
        })
    }

    /// Bind the configured address and serve until SIGTERM or SIGINT.
    pub async fn run(&self) -> Result<()> {
        let addr = format!("{}:{}", self.config.server.host, self.config.server.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| anyhow::anyhow!("failed to bind {}: {}", addr, e))?;

        self.run_with_listener(listener, async {
            match wait_for_shutdown_signal().await {
                Ok(signal) => tracing::info!(signal = signal, "shutdown signal received"),
                Err(e) => tracing::error!(error = %e, "signal handling failed, shutting down"),
            }
        })
        .await
    }

    /// Serve on `listener` until `shutdown` resolves, then drain and stop.
    pub async fn run_with_listener<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let pid_file = (!self.config.general.pid_file.is_empty())
            .then(|| self.config.general.pid_file.clone());
        if let Some(path) = &pid_file {
            write_pid_file(Path::new(path))?;
        }

        let uptime_task = self
            .config
            .metrics
            .enabled
            .then(|| spawn_uptime_updater(self.start_time, self.shutdown_tx.subscribe()));

        let state = AppState::new(Arc::clone(&self.queue), self.allowlist.clone());
        let served = server::serve(listener, state, shutdown).await;

        tracing::info!("draining ship queue");
        self.queue.shutdown().await;

        let _ = self.shutdown_tx.send(());
        if let Some(task) = uptime_task {
            let _ = task.await;
        }

        if let Some(path) = &pid_file {
            remove_pid_file(Path::new(path));
        }

        tracing::info!(
            runs_succeeded = self.ship.runs_succeeded(),
            runs_failed = self.ship.runs_failed(),
            "gvmship-daemon stopped"
        );
        served
    }

    /// Loaded configuration.
    pub fn config(&self) -> &GvmshipConfig {
        &self.config
    }

    /// Ship pipeline used by triggered runs.
    pub fn ship(&self) -> &Arc<ShipOrchestrator<Exporter>> {
        &self.ship
    }

    /// Single-flight queue.
    pub fn queue(&self) -> &Arc<ShipQueue> {
        &self.queue
    }

    /// Active caller allow-list.
    pub fn allowlist(&self) -> Option<&AllowList> {
        self.allowlist.as_ref()
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Write the current process PID to a file.
///
/// Refuses to start when the file already exists, so a second daemon
/// instance fails fast.
///
/// # Security
///
/// - `create_new(true)` creates the file atomically
/// - The created file must be a regular file
/// - Parent directory is created with mode 0o700, the file with 0o600
pub(crate) fn write_pid_file(path: &Path) -> Result<()> {
    use std::fs::{self, OpenOptions};
    use std::io::{ErrorKind, Write};

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            fs::DirBuilder::new()
                .mode(0o700)
                .recursive(true)
                .create(parent)?;
        }
        #[cfg(not(unix))]
        {
            fs::create_dir_all(parent)?;
        }
    }

    let pid = std::process::id();

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let existing_pid = fs::read_to_string(path).unwrap_or_else(|_| "unknown".to_string());
            return Err(anyhow::anyhow!(
                "PID file {} already exists with PID: {}. Is another instance running?",
                path.display(),
                existing_pid.trim()
            ));
        }
        Err(e) => return Err(e.into()),
    };

    if !file.metadata()?.is_file() {
        let _ = fs::remove_file(path);
        return Err(anyhow::anyhow!(
            "PID file {} is not a regular file",
            path.display()
        ));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }

    writeln!(file, "{}", pid)?;

    tracing::info!(pid = pid, path = %path.display(), "PID file written");
    Ok(())
}

/// Remove the PID file on daemon shutdown.
pub(crate) fn remove_pid_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(
            path = %path.display(),
            error = %e,
            "failed to remove PID file"
        );
    } else {
        tracing::info!(path = %path.display(), "PID file removed");
    }
}

/// Record build info once at startup.
fn record_daemon_metrics() {
    use gvmship_core::metrics as m;

    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "daemon metrics recorded");
}

/// Periodically refresh the uptime gauge.
fn spawn_uptime_updater(
    start_time: Instant,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    use gvmship_core::metrics as m;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(10));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS)
                        .set(start_time.elapsed().as_secs() as f64);
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!("uptime updater shutting down");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn write_pid_file_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("run").join("gvmship.pid");

        write_pid_file(&pid_file).expect("should write PID file");

        let content = fs::read_to_string(&pid_file).unwrap();
        assert_eq!(content.trim(), std::process::id().to_string());
    }

    #[test]
    fn write_pid_file_fails_if_already_exists() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("gvmship.pid");
        fs::write(&pid_file, "12345").unwrap();

        let err = write_pid_file(&pid_file).unwrap_err().to_string();
        assert!(err.contains("already exists"), "got: {err}");
        assert!(err.contains("12345"), "got: {err}");
    }

    #[cfg(unix)]
    #[test]
    fn write_pid_file_restricts_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("gvmship.pid");
        write_pid_file(&pid_file).unwrap();

        let mode = fs::metadata(&pid_file).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn remove_pid_file_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        remove_pid_file(&dir.path().join("absent.pid"));
    }

    #[tokio::test]
    async fn uptime_updater_stops_on_shutdown() {
        let (tx, rx) = broadcast::channel(1);
        let task = spawn_uptime_updater(Instant::now(), rx);
        tx.send(()).unwrap();
        let result = tokio::time::timeout(tokio::time::Duration::from_secs(1), task).await;
        assert!(result.is_ok());
    }
}
