//! 출력 로그 writer
//!
//! fan-out 레코드를 syslog 형식 한 줄씩 직렬화하여 파일에 기록합니다.
//!
//! ```text
//! <%b %d %H:%M:%S> <host-label> <program-label>: <json>
//! ```
//!
//! # 배치 원자성
//!
//! 한 번의 [`LogWriter::write`] 호출은 파일 잠금([`LogFile`] 뮤텍스 + `flock`)을 잡은 채로
//! 전체 배치를 한 번에 기록하고 flush한 뒤에 잠금을 놓습니다. 기록 도중 I/O 에러가 나면
//! 파일을 배치 이전 길이로 되돌리므로 앞서 기록된 줄은 손상되지 않습니다.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Local};
use tracing::{debug, warn};

use crate::error::ShipError;
use crate::lock::{FileLock, LogFile};
use crate::record::DerivedRecord;

/// 타임스탬프 형식 (연도, 타임존 없음)
pub const TIMESTAMP_FORMAT: &str = "%b %d %H:%M:%S";

/// 기본 호스트 레이블
pub const DEFAULT_HOST_LABEL: &str = "root";

/// 기본 프로그램 레이블
pub const DEFAULT_PROGRAM_LABEL: &str = "openvas";

/// 기록 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// 기존 내용을 지우고 기록
    Truncate,
    /// 기존 내용 뒤에 이어서 기록
    Append,
}

/// 로그 라인 형식 (호스트/프로그램 레이블)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineFormat {
    host_label: String,
    program_label: String,
}

impl Default for LineFormat {
    fn default() -> Self {
        Self::new(DEFAULT_HOST_LABEL, DEFAULT_PROGRAM_LABEL)
    }
}

impl LineFormat {
    /// 레이블을 지정하여 생성합니다.
    pub fn new(host_label: impl Into<String>, program_label: impl Into<String>) -> Self {
        Self {
            host_label: host_label.into(),
            program_label: program_label.into(),
        }
    }

    /// 호스트 레이블
    pub fn host_label(&self) -> &str {
        &self.host_label
    }

    /// 프로그램 레이블
    pub fn program_label(&self) -> &str {
        &self.program_label
    }

    /// 레코드 하나를 개행 없는 로그 라인으로 만듭니다.
    pub fn format_line(
        &self,
        record: &DerivedRecord,
        at: DateTime<Local>,
    ) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(record)?;
        Ok(format!(
            "{} {} {}: {}",
            at.format(TIMESTAMP_FORMAT),
            self.host_label,
            self.program_label,
            json
        ))
    }
}

/// 출력 로그 writer
#[derive(Debug, Clone, Default)]
pub struct LogWriter {
    format: LineFormat,
}

impl LogWriter {
    /// 라인 형식을 지정하여 생성합니다.
    pub fn new(format: LineFormat) -> Self {
        Self { format }
    }

    /// 라인 형식
    pub fn format(&self) -> &LineFormat {
        &self.format
    }

    /// 레코드 배치를 대상 파일에 기록하고 기록한 바이트 수를 반환합니다.
    ///
    /// 대상 파일이 없으면 생성하지만 부모 디렉토리는 만들지 않습니다.
    /// 직렬화에 실패하면 아무것도 기록하지 않고 `ShipError::Serialize`를 반환합니다.
    pub async fn write(
        &self,
        records: &[DerivedRecord],
        destination: &LogFile,
        mode: WriteMode,
    ) -> Result<usize, ShipError> {
        let _guard = destination.lock().await;

        // 잠금 획득 이후의 시각으로 기록
        let mut payload = String::new();
        for record in records {
            let line = self.format.format_line(record, Local::now())?;
            payload.push_str(&line);
            payload.push('\n');
        }
        let bytes = payload.len();

        let path = destination.path().to_path_buf();
        let result = tokio::task::spawn_blocking(move || {
            write_locked(&path, mode, payload.as_bytes())
        })
        .await
        .map_err(|e| ShipError::WriteFailed {
            path: destination.path().display().to_string(),
            source: std::io::Error::other(format!("write task failed: {e}")),
        })?;

        result.map_err(|source| ShipError::WriteFailed {
            path: destination.path().display().to_string(),
            source,
        })?;

        debug!(
            path = %destination.path().display(),
            records = records.len(),
            bytes,
            ?mode,
            "batch written"
        );
        Ok(bytes)
    }
}

/// 파일 잠금을 잡고 배치를 기록합니다 (blocking I/O).
fn write_locked(path: &Path, mode: WriteMode, payload: &[u8]) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.create(true);
    match mode {
        // truncate는 flock 획득 후에 수행
        WriteMode::Truncate => options.write(true),
        WriteMode::Append => options.append(true),
    };
    let file = options.open(path)?;
    let _flock = FileLock::exclusive(&file)?;

    if mode == WriteMode::Truncate {
        file.set_len(0)?;
    }
    let start = file.metadata()?.len();

    // flock이 `file`을 빌리고 있으므로 공유 참조로 기록
    if let Err(e) = (&file).write_all(payload).and_then(|()| (&file).flush()) {
        if let Err(rollback) = file.set_len(start) {
            warn!(
                path = %path.display(),
                error = %rollback,
                "failed to roll back partial batch"
            );
        }
        return Err(e);
    }

    Ok(())
}
