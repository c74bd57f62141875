//! ship 오케스트레이터 -- export부터 누적 로그 기록까지 한 번의 실행
//!
//! ```text
//! ReportExporter --> <stem>.csv --> read_report --> normalize --> fan_out_all
//!                                                                     |
//!                                          +--------------------------+
//!                                          |                          |
//!                                   staging (Truncate)      cumulative log (Append)
//! ```
//!
//! 한 번의 실행은 처음부터 끝까지 [`RunLock`]을 잡고 진행하므로, 같은 설정을 쓰는
//! 다른 오케스트레이터(다른 프로세스 포함)의 실행과 겹치지 않습니다.
//!
//! export 또는 CSV 읽기 단계에서 실패하면 어떤 파일에도 기록하지 않습니다.
//! 오케스트레이터는 실행 사이에 상태를 유지하지 않습니다 (누적 카운터 제외).

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use serde::Serialize;
use tracing::{error, info};

use gvmship_core::metrics as m;

use crate::config::ShipConfig;
use crate::csv_reader::read_report;
use crate::error::ShipError;
use crate::export::ReportExporter;
use crate::fanout::fan_out_all;
use crate::lock::{LogFile, RunLock};
use crate::normalize::normalize;
use crate::record::IdentifierSlot;
use crate::writer::{LogWriter, WriteMode};

/// 한 번의 실행 결과
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// 실행 ID (UUID v4)
    pub run_id: String,
    /// export 결과 파일
    pub export_file: PathBuf,
    /// 정규화된 행 수
    pub rows: usize,
    /// 기록된 fan-out 레코드 수
    pub records: usize,
    /// 누적 로그에 추가된 바이트 수
    pub bytes: usize,
    /// 소요 시간
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

mod duration_millis {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}

/// ship 오케스트레이터
///
/// 같은 누적 로그를 다루는 [`ArchiveRotator`](crate::archive::ArchiveRotator)와
/// [`LogFile`] 핸들을 공유해야 로테이션과 기록이 직렬화됩니다.
pub struct ShipOrchestrator<E: ReportExporter> {
    exporter: Arc<E>,
    writer: LogWriter,
    config: ShipConfig,
    staging: LogFile,
    cumulative: LogFile,
    runs_succeeded: Arc<AtomicU64>,
    runs_failed: Arc<AtomicU64>,
}

impl<E: ReportExporter> ShipOrchestrator<E> {
    /// 빌더를 생성합니다.
    pub fn builder() -> ShipOrchestratorBuilder<E> {
        ShipOrchestratorBuilder::new()
    }

    /// 기본 스테이징 파일 핸들
    pub fn staging(&self) -> &LogFile {
        &self.staging
    }

    /// 누적 로그 파일 핸들
    pub fn cumulative_log(&self) -> &LogFile {
        &self.cumulative
    }

    /// 설정
    pub fn config(&self) -> &ShipConfig {
        &self.config
    }

    /// 성공한 실행 수
    pub fn runs_succeeded(&self) -> u64 {
        self.runs_succeeded.load(Ordering::Relaxed)
    }

    /// 실패한 실행 수
    pub fn runs_failed(&self) -> u64 {
        self.runs_failed.load(Ordering::Relaxed)
    }

    /// export → 정규화 → fan-out → 기록을 한 번 수행합니다.
    ///
    /// 결과는 `staging`에 새로 쓰고(Truncate), 누적 로그에 이어 씁니다(Append).
    pub async fn run(&self, staging: &LogFile) -> Result<RunReport, ShipError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();

        info!(
            run_id = %run_id,
            exporter = self.exporter.name(),
            staging = %staging.path().display(),
            cumulative = %self.cumulative.path().display(),
            "ship run started"
        );

        let result = self.run_inner(&run_id, staging, started).await;
        let elapsed = started.elapsed();
        histogram!(m::SHIP_RUN_DURATION_SECONDS).record(elapsed.as_secs_f64());

        match &result {
            Ok(report) => {
                self.runs_succeeded.fetch_add(1, Ordering::Relaxed);
                counter!(m::SHIP_RUNS_TOTAL, m::LABEL_RESULT => m::RESULT_SUCCESS).increment(1);
                info!(
                    run_id = %run_id,
                    rows = report.rows,
                    records = report.records,
                    bytes = report.bytes,
                    duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                    "ship run completed"
                );
            }
            Err(e) => {
                self.runs_failed.fetch_add(1, Ordering::Relaxed);
                counter!(m::SHIP_RUNS_TOTAL, m::LABEL_RESULT => m::RESULT_FAILURE).increment(1);
                error!(
                    run_id = %run_id,
                    error = %e,
                    export_failure = e.is_export_failure(),
                    "ship run failed"
                );
            }
        }

        result
    }

    /// 기본 스테이징 파일로 실행합니다.
    pub async fn run_default(&self) -> Result<RunReport, ShipError> {
        self.run(&self.staging).await
    }

    async fn run_inner(
        &self,
        run_id: &str,
        staging: &LogFile,
        started: Instant,
    ) -> Result<RunReport, ShipError> {
        let lock_path = self.config.run_lock_path();
        let _run_lock = RunLock::acquire(&lock_path)
            .await
            .map_err(|source| ShipError::Io {
                path: lock_path.display().to_string(),
                source,
            })?;

        // 1. export
        let export_file = self.exporter.export(&self.config.export_stem()).await?;

        // 2. CSV 읽기 + 정규화 (blocking I/O)
        let path = export_file.clone();
        let rows = tokio::task::spawn_blocking(move || read_report(&path))
            .await
            .map_err(|e| ShipError::ExportFailed {
                reason: format!("report read task failed: {e}"),
            })??;
        let row_count = rows.len();
        let canonical: Vec<_> = rows.into_iter().map(normalize).collect();
        counter!(m::SHIP_ROWS_PROCESSED_TOTAL).increment(row_count as u64);

        // 3. fan-out
        let records = fan_out_all(&canonical);
        tracing::debug!(run_id, rows = row_count, records = records.len(), "report transformed");

        // 4. 스테이징 → 누적 로그
        self.writer
            .write(&records, staging, WriteMode::Truncate)
            .await?;
        let bytes = self
            .writer
            .write(&records, &self.cumulative, WriteMode::Append)
            .await?;

        for slot in IdentifierSlot::ALL {
            let n = records.iter().filter(|r| r.slot() == slot).count();
            counter!(m::SHIP_RECORDS_WRITTEN_TOTAL, m::LABEL_SLOT => slot.as_str())
                .increment(n as u64);
        }

        Ok(RunReport {
            run_id: run_id.to_owned(),
            export_file,
            rows: row_count,
            records: records.len(),
            bytes,
            duration: started.elapsed(),
        })
    }
}

/// [`ShipOrchestrator`] 빌더
pub struct ShipOrchestratorBuilder<E: ReportExporter> {
    config: ShipConfig,
    exporter: Option<E>,
    cumulative: Option<LogFile>,
}

impl<E: ReportExporter> ShipOrchestratorBuilder<E> {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: ShipConfig::default(),
            exporter: None,
            cumulative: None,
        }
    }

    /// 실행 설정을 지정합니다.
    pub fn config(mut self, config: ShipConfig) -> Self {
        self.config = config;
        self
    }

    /// export 구현을 지정합니다.
    pub fn exporter(mut self, exporter: E) -> Self {
        self.exporter = Some(exporter);
        self
    }

    /// 누적 로그 핸들을 지정합니다 (rotator와 잠금 공유용).
    ///
    /// 지정하지 않으면 설정 경로로 새 핸들을 만듭니다.
    pub fn cumulative_log(mut self, log: LogFile) -> Self {
        self.cumulative = Some(log);
        self
    }

    /// 오케스트레이터를 빌드합니다.
    pub fn build(self) -> Result<ShipOrchestrator<E>, ShipError> {
        self.config.validate()?;

        let exporter = self.exporter.ok_or_else(|| ShipError::Config {
            field: "exporter".to_owned(),
            reason: "an exporter is required".to_owned(),
        })?;

        let cumulative = match self.cumulative {
            Some(log) if log.path() != self.config.cumulative_log_path => {
                return Err(ShipError::Config {
                    field: "cumulative_log_path".to_owned(),
                    reason: format!(
                        "shared log handle points to {} but config says {}",
                        log.path().display(),
                        self.config.cumulative_log_path.display()
                    ),
                });
            }
            Some(log) => log,
            None => LogFile::new(&self.config.cumulative_log_path),
        };

        Ok(ShipOrchestrator {
            exporter: Arc::new(exporter),
            writer: LogWriter::new(self.config.line_format()),
            staging: LogFile::new(&self.config.staging_path),
            cumulative,
            config: self.config,
            runs_succeeded: Arc::new(AtomicU64::new(0)),
            runs_failed: Arc::new(AtomicU64::new(0)),
        })
    }
}

impl<E: ReportExporter> Default for ShipOrchestratorBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}
