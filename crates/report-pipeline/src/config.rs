//! ship 실행 설정
//!
//! [`ShipConfig`]는 core의 `[output]`/`[export]` 섹션에서 파이프라인에 필요한 값만 추려
//! 경로 타입으로 보관합니다.
//!
//! # 사용 예시
//!
//! ```
//! use gvmship_report::ShipConfigBuilder;
//!
//! let config = ShipConfigBuilder::new()
//!     .staging_path("/tmp/gvmship/temp")
//!     .cumulative_log_path("/tmp/gvmship/scans")
//!     .host_label("scanner01")
//!     .build()
//!     .unwrap();
//! assert_eq!(config.program_label, "openvas");
//! ```

use std::path::{Component, Path, PathBuf};

use gvmship_core::config::GvmshipConfig;

use crate::error::ShipError;
use crate::lock::RUN_LOCK_FILE;
use crate::writer::{DEFAULT_HOST_LABEL, DEFAULT_PROGRAM_LABEL, LineFormat};

/// export 결과 CSV의 파일명 (확장자 제외)
pub const EXPORT_STEM: &str = "latest-report";

/// ship 실행 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShipConfig {
    /// 실행마다 새로 쓰는 스테이징 파일
    pub staging_path: PathBuf,
    /// 누적 로그 파일
    pub cumulative_log_path: PathBuf,
    /// export 결과를 둘 디렉토리
    pub export_dir: PathBuf,
    /// 로그 라인 호스트 레이블
    pub host_label: String,
    /// 로그 라인 프로그램 레이블
    pub program_label: String,
}

impl Default for ShipConfig {
    fn default() -> Self {
        Self {
            staging_path: PathBuf::from("/var/cache/gvmship/temp"),
            cumulative_log_path: PathBuf::from("/var/log/gvmship/scans"),
            export_dir: PathBuf::from("/var/cache/gvmship"),
            host_label: DEFAULT_HOST_LABEL.to_owned(),
            program_label: DEFAULT_PROGRAM_LABEL.to_owned(),
        }
    }
}

impl ShipConfig {
    /// core 설정에서 생성합니다.
    pub fn from_core(core: &GvmshipConfig) -> Self {
        Self {
            staging_path: PathBuf::from(&core.output.staging_path),
            cumulative_log_path: PathBuf::from(&core.output.cumulative_log_path),
            export_dir: PathBuf::from(&core.export.work_dir),
            host_label: core.output.host_label.clone(),
            program_label: core.output.program_label.clone(),
        }
    }

    /// export가 결과를 쓸 경로 (확장자 제외). 실제 파일은 `<stem>.csv`.
    pub fn export_stem(&self) -> PathBuf {
        self.export_dir.join(EXPORT_STEM)
    }

    /// 실행 잠금 파일 경로
    pub fn run_lock_path(&self) -> PathBuf {
        self.export_dir.join(RUN_LOCK_FILE)
    }

    /// 로그 라인 형식
    pub fn line_format(&self) -> LineFormat {
        LineFormat::new(&self.host_label, &self.program_label)
    }

    /// 설정 값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ShipError> {
        for (field, path) in [
            ("staging_path", &self.staging_path),
            ("cumulative_log_path", &self.cumulative_log_path),
            ("export_dir", &self.export_dir),
        ] {
            check_path(field, path)?;
        }

        if self.staging_path == self.cumulative_log_path {
            return Err(ShipError::Config {
                field: "staging_path".to_owned(),
                reason: "must differ from cumulative_log_path".to_owned(),
            });
        }

        for (field, label) in [
            ("host_label", &self.host_label),
            ("program_label", &self.program_label),
        ] {
            if label.is_empty() || label.chars().any(char::is_whitespace) {
                return Err(ShipError::Config {
                    field: field.to_owned(),
                    reason: "must be non-empty and contain no whitespace".to_owned(),
                });
            }
        }

        Ok(())
    }
}

fn check_path(field: &str, path: &Path) -> Result<(), ShipError> {
    if path.as_os_str().is_empty() {
        return Err(ShipError::Config {
            field: field.to_owned(),
            reason: "path must not be empty".to_owned(),
        });
    }
    if path.components().any(|c| c == Component::ParentDir) {
        return Err(ShipError::Config {
            field: field.to_owned(),
            reason: format!(
                "path '{}' contains path traversal pattern '..'",
                path.display()
            ),
        });
    }
    Ok(())
}

/// [`ShipConfig`] 빌더
#[derive(Default)]
pub struct ShipConfigBuilder {
    config: ShipConfig,
}

impl ShipConfigBuilder {
    /// 기본값을 가진 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 스테이징 파일 경로를 설정합니다.
    pub fn staging_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.staging_path = path.into();
        self
    }

    /// 누적 로그 경로를 설정합니다.
    pub fn cumulative_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.cumulative_log_path = path.into();
        self
    }

    /// export 디렉토리를 설정합니다.
    pub fn export_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.export_dir = path.into();
        self
    }

    /// 호스트 레이블을 설정합니다.
    pub fn host_label(mut self, label: impl Into<String>) -> Self {
        self.config.host_label = label.into();
        self
    }

    /// 프로그램 레이블을 설정합니다.
    pub fn program_label(mut self, label: impl Into<String>) -> Self {
        self.config.program_label = label.into();
        self
    }

    /// 설정을 빌드하고 검증합니다.
    pub fn build(self) -> Result<ShipConfig, ShipError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
