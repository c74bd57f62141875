//! Shared fixtures for daemon integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use gvmship_report::export::csv_path;
use gvmship_report::{ReportExporter, ShipConfigBuilder, ShipError, ShipOrchestrator};
use tempfile::TempDir;
use tokio::sync::Semaphore;

/// Two rows: 4 + 3 fan-out records.
pub const REPORT_CSV: &str = "\
IP,Hostname,Port,Port Protocol,CVSS,Severity,CVEs,BIDs,CERTs,Other References
10.0.0.5,10.0.0.5,443,tcp,5.0,Medium,\"CVE-1,CVE-2\",,,
10.0.0.6,web02,22,tcp,7.5,High,CVE-3,BID-9,,https://example.org
";

pub const RECORDS_PER_RUN: usize = 7;

/// Exporter that blocks until the test releases it.
#[derive(Clone)]
pub struct GatedExporter {
    source: PathBuf,
    started: Arc<Semaphore>,
    gate: Arc<Semaphore>,
}

impl GatedExporter {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            started: Arc::new(Semaphore::new(0)),
            gate: Arc::new(Semaphore::new(0)),
        }
    }

    /// Wait until an export has begun.
    pub async fn wait_started(&self) {
        let permit = tokio::time::timeout(Duration::from_secs(5), self.started.acquire())
            .await
            .expect("export did not start")
            .expect("semaphore closed");
        permit.forget();
    }

    /// Let `n` blocked exports proceed.
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }
}

impl ReportExporter for GatedExporter {
    async fn export(&self, dest_stem: &Path) -> Result<PathBuf, ShipError> {
        self.started.add_permits(1);
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| ShipError::ExportFailed {
                reason: e.to_string(),
            })?;
        permit.forget();

        let dest = csv_path(dest_stem);
        tokio::fs::copy(&self.source, &dest)
            .await
            .map_err(|e| ShipError::ExportFailed {
                reason: e.to_string(),
            })?;
        Ok(dest)
    }

    fn name(&self) -> &'static str {
        "gated"
    }
}

/// Temp workspace with a report source file.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("source.csv"), REPORT_CSV).expect("write source");
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn source(&self) -> PathBuf {
        self.path().join("source.csv")
    }

    pub fn cumulative(&self) -> PathBuf {
        self.path().join("scans")
    }

    pub fn orchestrator<E: ReportExporter>(&self, exporter: E) -> Arc<ShipOrchestrator<E>> {
        let config = ShipConfigBuilder::new()
            .staging_path(self.path().join("temp"))
            .cumulative_log_path(self.cumulative())
            .export_dir(self.path())
            .build()
            .expect("ship config");
        Arc::new(
            ShipOrchestrator::builder()
                .config(config)
                .exporter(exporter)
                .build()
                .expect("ship orchestrator"),
        )
    }

    pub fn cumulative_lines(&self) -> usize {
        std::fs::read_to_string(self.cumulative())
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }
}

/// Poll `cond` until it holds or five seconds pass.
pub async fn eventually(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..500 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}
