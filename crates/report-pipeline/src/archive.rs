//! 누적 로그 아카이브 로테이션
//!
//! 누적 로그를 `<archive_dir>/<YYYYMMDD>_scans`로 복사(권한, 접근/수정 시각 포함)한 뒤
//! 같은 파일을 제자리에서 길이 0으로 만듭니다. 삭제 후 재생성이 아니므로 파일을 열어 둔
//! writer는 다시 열지 않고 계속 기록할 수 있습니다.
//!
//! 같은 날 여러 번 로테이션하면 같은 아카이브 파일을 덮어씁니다.

use std::fs::{File, FileTimes, OpenOptions};
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use metrics::{counter, gauge};
use serde::Serialize;
use tracing::{info, warn};

use gvmship_core::metrics as m;

use crate::error::ShipError;
use crate::lock::{FileLock, LogFile};

/// 아카이브 파일명 접미사
pub const ARCHIVE_SUFFIX: &str = "_scans";

/// 로테이션 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RotationOutcome {
    /// 아카이브 후 truncate 완료
    Archived {
        /// 생성(또는 덮어쓴) 아카이브 파일
        archive_path: PathBuf,
        /// 복사한 바이트 수
        bytes: u64,
    },
    /// 로그 파일이 없어 아무것도 하지 않음
    Noop {
        /// 대상 로그 경로
        log_path: PathBuf,
    },
}

/// 날짜에 해당하는 아카이브 파일명
pub fn archive_file_name(date: NaiveDate) -> String {
    format!("{}{ARCHIVE_SUFFIX}", date.format("%Y%m%d"))
}

/// 아카이브 로테이터
#[derive(Debug, Clone)]
pub struct ArchiveRotator {
    archive_dir: PathBuf,
}

impl ArchiveRotator {
    /// 아카이브 디렉토리를 지정하여 생성합니다.
    pub fn new(archive_dir: impl Into<PathBuf>) -> Self {
        Self {
            archive_dir: archive_dir.into(),
        }
    }

    /// 아카이브 디렉토리
    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }

    /// 오늘(로컬 날짜) 기준으로 로테이션합니다.
    pub async fn rotate(&self, log: &LogFile) -> Result<RotationOutcome, ShipError> {
        self.rotate_on(log, Local::now().date_naive()).await
    }

    /// 지정한 날짜의 아카이브 파일로 로테이션합니다.
    pub async fn rotate_on(
        &self,
        log: &LogFile,
        date: NaiveDate,
    ) -> Result<RotationOutcome, ShipError> {
        self.ensure_archive_dir().await?;

        let archive_path = self.archive_dir.join(archive_file_name(date));
        let _guard = log.lock().await;

        let log_path = log.path().to_path_buf();
        let target = archive_path.clone();
        let copied = tokio::task::spawn_blocking(move || rotate_locked(&log_path, &target))
            .await
            .map_err(|e| ShipError::Rotation {
                path: log.path().display().to_string(),
                reason: format!("rotation task failed: {e}"),
            })?;

        match copied {
            Ok(Some(bytes)) => {
                counter!(m::ARCHIVE_ROTATIONS_TOTAL, m::LABEL_RESULT => m::RESULT_ARCHIVED)
                    .increment(1);
                gauge!(m::ARCHIVE_LAST_ROTATED_BYTES).set(bytes as f64);
                info!(
                    log = %log.path().display(),
                    archive = %archive_path.display(),
                    bytes,
                    "cumulative log archived and truncated"
                );
                Ok(RotationOutcome::Archived {
                    archive_path,
                    bytes,
                })
            }
            Ok(None) => {
                counter!(m::ARCHIVE_ROTATIONS_TOTAL, m::LABEL_RESULT => m::RESULT_NOOP)
                    .increment(1);
                warn!(log = %log.path().display(), "no scans file found, nothing to archive");
                Ok(RotationOutcome::Noop {
                    log_path: log.path().to_path_buf(),
                })
            }
            Err(e) => {
                counter!(m::ARCHIVE_ROTATIONS_TOTAL, m::LABEL_RESULT => m::RESULT_FAILURE)
                    .increment(1);
                Err(e)
            }
        }
    }

    async fn ensure_archive_dir(&self) -> Result<(), ShipError> {
        if tokio::fs::try_exists(&self.archive_dir).await.unwrap_or(false) {
            return Ok(());
        }
        tokio::fs::create_dir_all(&self.archive_dir)
            .await
            .map_err(|e| ShipError::Io {
                path: self.archive_dir.display().to_string(),
                source: e,
            })?;
        info!(dir = %self.archive_dir.display(), "created missing archive directory");
        Ok(())
    }
}

/// 아카이브 디렉토리와 로그 핸들로 한 번 로테이션합니다.
pub async fn rotate(archive_dir: &Path, log: &LogFile) -> Result<RotationOutcome, ShipError> {
    ArchiveRotator::new(archive_dir).rotate(log).await
}

/// 파일 잠금을 잡고 복사 후 truncate 합니다 (blocking I/O).
///
/// 로그가 없거나 일반 파일이 아니면 `Ok(None)`.
fn rotate_locked(log_path: &Path, archive_path: &Path) -> Result<Option<u64>, ShipError> {
    let rotation_err = |reason: String| ShipError::Rotation {
        path: log_path.display().to_string(),
        reason,
    };

    match std::fs::metadata(log_path) {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => return Ok(None),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(rotation_err(format!("cannot stat log: {e}"))),
    }

    let log = OpenOptions::new()
        .read(true)
        .write(true)
        .open(log_path)
        .map_err(|e| rotation_err(format!("cannot open log: {e}")))?;
    let _flock =
        FileLock::exclusive(&log).map_err(|e| rotation_err(format!("cannot lock log: {e}")))?;

    // 잠금 이후의 메타데이터 기준
    let meta = log
        .metadata()
        .map_err(|e| rotation_err(format!("cannot stat log: {e}")))?;

    let mut archive = File::create(archive_path)
        .map_err(|e| rotation_err(format!("cannot create {}: {e}", archive_path.display())))?;
    let bytes = std::io::copy(&mut &log, &mut archive)
        .map_err(|e| rotation_err(format!("copy to {} failed: {e}", archive_path.display())))?;
    archive
        .sync_all()
        .map_err(|e| rotation_err(format!("sync of {} failed: {e}", archive_path.display())))?;

    preserve_metadata(&archive, &meta, archive_path);

    log.set_len(0)
        .map_err(|e| rotation_err(format!("truncate failed: {e}")))?;

    Ok(Some(bytes))
}

/// 권한과 접근/수정 시각을 아카이브에 복사합니다. 실패는 경고만 남깁니다.
fn preserve_metadata(archive: &File, meta: &std::fs::Metadata, archive_path: &Path) {
    if let Err(e) = archive.set_permissions(meta.permissions()) {
        warn!(archive = %archive_path.display(), error = %e, "failed to copy permissions");
    }

    let mut times = FileTimes::new();
    if let Ok(accessed) = meta.accessed() {
        times = times.set_accessed(accessed);
    }
    if let Ok(modified) = meta.modified() {
        times = times.set_modified(modified);
    }
    if let Err(e) = archive.set_times(times) {
        warn!(archive = %archive_path.display(), error = %e, "failed to copy timestamps");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 7).unwrap()
    }

    #[test]
    fn archive_name_format() {
        assert_eq!(archive_file_name(date()), "20240307_scans");
    }

    #[tokio::test]
    async fn rotation_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let log = LogFile::new(dir.path().join("scans"));
        let content = "line one\nline two\n";
        std::fs::write(log.path(), content).unwrap();

        let rotator = ArchiveRotator::new(dir.path().join("archive"));
        let outcome = rotator.rotate_on(&log, date()).await.unwrap();

        let archive_path = dir.path().join("archive/20240307_scans");
        assert_eq!(
            outcome,
            RotationOutcome::Archived {
                archive_path: archive_path.clone(),
                bytes: content.len() as u64,
            }
        );
        assert_eq!(std::fs::read_to_string(&archive_path).unwrap(), content);
        assert_eq!(std::fs::metadata(log.path()).unwrap().len(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn truncates_in_place_and_open_writer_continues() {
        use std::os::unix::fs::MetadataExt;

        let dir = tempfile::tempdir().unwrap();
        let log = LogFile::new(dir.path().join("scans"));
        let mut writer = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log.path())
            .unwrap();
        writer.write_all(b"before rotation\n").unwrap();
        let inode_before = std::fs::metadata(log.path()).unwrap().ino();

        ArchiveRotator::new(dir.path().join("archive"))
            .rotate_on(&log, date())
            .await
            .unwrap();

        // 다시 열지 않고 이어서 기록
        writer.write_all(b"after rotation\n").unwrap();
        let inode_after = std::fs::metadata(log.path()).unwrap().ino();
        assert_eq!(inode_before, inode_after);
        assert_eq!(
            std::fs::read_to_string(log.path()).unwrap(),
            "after rotation\n"
        );
    }

    #[tokio::test]
    async fn missing_log_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let log = LogFile::new(dir.path().join("absent"));
        let outcome = rotate(&dir.path().join("archive"), &log).await.unwrap();
        assert!(matches!(outcome, RotationOutcome::Noop { .. }));
        // 디렉토리는 먼저 만들어짐
        assert!(dir.path().join("archive").is_dir());
    }

    #[tokio::test]
    async fn directory_in_place_of_log_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let log = LogFile::new(dir.path());
        let outcome = ArchiveRotator::new(dir.path().join("archive"))
            .rotate_on(&log, date())
            .await
            .unwrap();
        assert!(matches!(outcome, RotationOutcome::Noop { .. }));
    }

    #[tokio::test]
    async fn same_day_rotation_overwrites_archive() {
        let dir = tempfile::tempdir().unwrap();
        let log = LogFile::new(dir.path().join("scans"));
        let rotator = ArchiveRotator::new(dir.path().join("archive"));

        std::fs::write(log.path(), "first\n").unwrap();
        rotator.rotate_on(&log, date()).await.unwrap();
        std::fs::write(log.path(), "second\n").unwrap();
        rotator.rotate_on(&log, date()).await.unwrap();

        let archived =
            std::fs::read_to_string(dir.path().join("archive/20240307_scans")).unwrap();
        assert_eq!(archived, "second\n");
    }

    #[tokio::test]
    async fn archive_keeps_modification_time() {
        let dir = tempfile::tempdir().unwrap();
        let log = LogFile::new(dir.path().join("scans"));
        std::fs::write(log.path(), "x\n").unwrap();
        let past = std::time::SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_600_000_000);
        File::options()
            .write(true)
            .open(log.path())
            .unwrap()
            .set_modified(past)
            .unwrap();

        let outcome = ArchiveRotator::new(dir.path().join("archive"))
            .rotate_on(&log, date())
            .await
            .unwrap();
        let RotationOutcome::Archived { archive_path, .. } = outcome else {
            panic!("expected archived outcome");
        };
        let modified = std::fs::metadata(archive_path).unwrap().modified().unwrap();
        assert_eq!(modified, past);
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let json = serde_json::to_value(RotationOutcome::Noop {
            log_path: PathBuf::from("/var/log/gvmship/scans"),
        })
        .unwrap();
        assert_eq!(json["outcome"], "noop");
    }
}
