//! 에러 타입 -- 도메인별 에러 정의

/// gvmship 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum GvmshipError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 리포트 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 리포트 파이프라인 에러 (도메인 크레이트에서 변환되어 올라옴)
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 외부 export 실패 (타임아웃 포함)
    #[error("export failed: {0}")]
    Export(String),

    /// 출력 로그 쓰기 실패
    #[error("write failed: {0}")]
    Write(String),

    /// 아카이브 로테이션 실패
    #[error("rotation failed: {0}")]
    Rotation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_converts_to_top_level() {
        let err: GvmshipError = ConfigError::InvalidValue {
            field: "server.port".to_owned(),
            reason: "must not be 0".to_owned(),
        }
        .into();
        assert!(matches!(err, GvmshipError::Config(_)));
        assert!(err.to_string().contains("server.port"));
    }

    #[test]
    fn pipeline_error_display() {
        let err = GvmshipError::from(PipelineError::Export("exit status 1".to_owned()));
        let msg = err.to_string();
        assert!(msg.contains("export failed"));
        assert!(msg.contains("exit status 1"));
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: GvmshipError = io.into();
        assert!(matches!(err, GvmshipError::Io(_)));
    }
}
