//! 리포트 파이프라인 에러 타입
//!
//! [`ShipError`]는 export → 정규화 → fan-out → 출력 → 아카이브 과정에서 발생할 수 있는
//! 모든 에러를 나타냅니다. `From<ShipError> for GvmshipError` 구현을 통해
//! `?` 연산자로 상위 에러 타입으로 전파됩니다.
//!
//! # 에러 카테고리
//!
//! - **Export**: `ExportFailed`, `ExportTimeout`
//! - **출력**: `Serialize`, `WriteFailed`
//! - **아카이브**: `Rotation`
//! - **설정**: `Config`
//! - **파일 I/O**: `Io`
//!
//! 정규화는 실패하지 않으므로 별도의 행 파싱 에러는 없습니다.

use gvmship_core::error::{GvmshipError, PipelineError};

/// 리포트 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ShipError {
    /// export가 사용 가능한 CSV 파일을 만들지 못함
    #[error("export failed: {reason}")]
    ExportFailed {
        /// 실패 사유 (종료 코드, stderr 발췌 등)
        reason: String,
    },

    /// export가 제한 시간 안에 끝나지 않음
    #[error("export timed out after {}ms", timeout.as_millis())]
    ExportTimeout {
        /// 적용된 타임아웃
        timeout: std::time::Duration,
    },

    /// 레코드 직렬화 실패
    #[error("serialize error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// 스테이징 또는 누적 로그 쓰기 실패
    #[error("write failed: {path}: {source}")]
    WriteFailed {
        /// 대상 파일 경로
        path: String,
        /// 원본 I/O 에러
        source: std::io::Error,
    },

    /// 아카이브 로테이션 실패
    #[error("rotation failed: {path}: {reason}")]
    Rotation {
        /// 관련 파일 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 파일 I/O 에러
    #[error("io error: {path}: {source}")]
    Io {
        /// 관련 파일 경로
        path: String,
        /// 원본 I/O 에러
        source: std::io::Error,
    },
}

impl ShipError {
    /// export 단계의 실패인지 반환합니다.
    pub fn is_export_failure(&self) -> bool {
        matches!(self, Self::ExportFailed { .. } | Self::ExportTimeout { .. })
    }
}

impl From<ShipError> for GvmshipError {
    fn from(err: ShipError) -> Self {
        match err {
            ShipError::ExportFailed { reason } => {
                GvmshipError::Pipeline(PipelineError::Export(reason))
            }
            ShipError::ExportTimeout { timeout } => GvmshipError::Pipeline(
                PipelineError::Export(format!("timed out after {}ms", timeout.as_millis())),
            ),
            ShipError::Serialize(e) => {
                GvmshipError::Pipeline(PipelineError::Write(format!("serialize error: {e}")))
            }
            ShipError::WriteFailed { path, source } => {
                GvmshipError::Pipeline(PipelineError::Write(format!("{path}: {source}")))
            }
            ShipError::Rotation { path, reason } => {
                GvmshipError::Pipeline(PipelineError::Rotation(format!("{path}: {reason}")))
            }
            ShipError::Config { field, reason } => {
                GvmshipError::Config(gvmship_core::error::ConfigError::InvalidValue {
                    field,
                    reason,
                })
            }
            ShipError::Io { source, .. } => GvmshipError::Io(source),
        }
    }
}
