//! 설정 관리 -- gvmship.toml 파싱 및 런타임 설정
//!
//! [`GvmshipConfig`]는 모든 컴포넌트의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`GVMSHIP_SERVER_PORT=5001` 형식)
//! 3. 설정 파일 (`gvmship.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), gvmship_core::error::GvmshipError> {
//! use gvmship_core::config::GvmshipConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = GvmshipConfig::load("gvmship.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = GvmshipConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::{Component, Path};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, GvmshipError};

/// 경로 설정값 최대 길이
const MAX_PATH_LEN: usize = 4096;

/// 트리거 큐 최대 용량
const MAX_QUEUE_CAPACITY: usize = 64;

/// export 타임아웃 상한 (초)
const MAX_EXPORT_TIMEOUT_SECS: u64 = 3600;

/// gvmship 통합 설정
///
/// `gvmship.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GvmshipConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 트리거 HTTP 서버 설정
    #[serde(default)]
    pub server: ServerConfig,
    /// 리포트 export 설정
    #[serde(default)]
    pub export: ExportConfig,
    /// 출력 로그 설정
    #[serde(default)]
    pub output: OutputConfig,
    /// 아카이브 설정
    #[serde(default)]
    pub archive: ArchiveConfig,
    /// 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl GvmshipConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, GvmshipError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음, 검증 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, GvmshipError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GvmshipError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                GvmshipError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, GvmshipError> {
        toml::from_str(toml_str).map_err(|e| {
            GvmshipError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `GVMSHIP_{SECTION}_{FIELD}`
    /// 예: `GVMSHIP_EXPORT_PASSWORD=secret`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "GVMSHIP_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "GVMSHIP_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.pid_file, "GVMSHIP_GENERAL_PID_FILE");

        // Server
        override_string(&mut self.server.host, "GVMSHIP_SERVER_HOST");
        override_u16(&mut self.server.port, "GVMSHIP_SERVER_PORT");
        override_bool(
            &mut self.server.allowlist_enabled,
            "GVMSHIP_SERVER_ALLOWLIST_ENABLED",
        );
        override_string(
            &mut self.server.allowlist_path,
            "GVMSHIP_SERVER_ALLOWLIST_PATH",
        );
        override_usize(
            &mut self.server.queue_capacity,
            "GVMSHIP_SERVER_QUEUE_CAPACITY",
        );

        // Export
        override_string(&mut self.export.mode, "GVMSHIP_EXPORT_MODE");
        override_string(&mut self.export.gvm_script, "GVMSHIP_EXPORT_GVM_SCRIPT");
        override_bool(&mut self.export.use_sudo, "GVMSHIP_EXPORT_USE_SUDO");
        override_string(&mut self.export.run_as_user, "GVMSHIP_EXPORT_RUN_AS_USER");
        override_string(&mut self.export.username, "GVMSHIP_EXPORT_USERNAME");
        override_string(&mut self.export.password, "GVMSHIP_EXPORT_PASSWORD");
        override_string(&mut self.export.connection, "GVMSHIP_EXPORT_CONNECTION");
        override_string(&mut self.export.script_path, "GVMSHIP_EXPORT_SCRIPT_PATH");
        override_string(&mut self.export.source_file, "GVMSHIP_EXPORT_SOURCE_FILE");
        override_string(&mut self.export.work_dir, "GVMSHIP_EXPORT_WORK_DIR");
        override_u64(&mut self.export.timeout_secs, "GVMSHIP_EXPORT_TIMEOUT_SECS");

        // Output
        override_string(&mut self.output.staging_path, "GVMSHIP_OUTPUT_STAGING_PATH");
        override_string(
            &mut self.output.cumulative_log_path,
            "GVMSHIP_OUTPUT_CUMULATIVE_LOG_PATH",
        );
        override_string(&mut self.output.host_label, "GVMSHIP_OUTPUT_HOST_LABEL");
        override_string(
            &mut self.output.program_label,
            "GVMSHIP_OUTPUT_PROGRAM_LABEL",
        );

        // Archive
        override_string(&mut self.archive.archive_dir, "GVMSHIP_ARCHIVE_ARCHIVE_DIR");

        // Metrics
        override_bool(&mut self.metrics.enabled, "GVMSHIP_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "GVMSHIP_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "GVMSHIP_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), GvmshipError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        // 서버
        if self.server.host.is_empty() {
            return Err(invalid("server.host", "must not be empty".to_owned()));
        }
        if self.server.port == 0 {
            return Err(invalid("server.port", "must not be 0".to_owned()));
        }
        if self.server.queue_capacity == 0 || self.server.queue_capacity > MAX_QUEUE_CAPACITY {
            return Err(invalid(
                "server.queue_capacity",
                format!("must be 1-{MAX_QUEUE_CAPACITY}"),
            ));
        }

        // export
        let valid_modes = ["gvm-script", "file"];
        if !valid_modes.contains(&self.export.mode.as_str()) {
            return Err(invalid(
                "export.mode",
                format!("must be one of: {}", valid_modes.join(", ")),
            ));
        }
        if self.export.timeout_secs == 0 || self.export.timeout_secs > MAX_EXPORT_TIMEOUT_SECS {
            return Err(invalid(
                "export.timeout_secs",
                format!("must be 1-{MAX_EXPORT_TIMEOUT_SECS}"),
            ));
        }
        check_path("export.work_dir", &self.export.work_dir)?;
        match self.export.mode.as_str() {
            "gvm-script" => {
                if self.export.gvm_script.is_empty() {
                    return Err(invalid(
                        "export.gvm_script",
                        "must not be empty in gvm-script mode".to_owned(),
                    ));
                }
                check_path("export.script_path", &self.export.script_path)?;
                if self.export.use_sudo && self.export.run_as_user.is_empty() {
                    return Err(invalid(
                        "export.run_as_user",
                        "must not be empty when use_sudo is enabled".to_owned(),
                    ));
                }
            }
            _ => check_path("export.source_file", &self.export.source_file)?,
        }

        // 출력
        check_path("output.staging_path", &self.output.staging_path)?;
        check_path("output.cumulative_log_path", &self.output.cumulative_log_path)?;
        if self.output.staging_path == self.output.cumulative_log_path {
            return Err(invalid(
                "output.staging_path",
                "must differ from output.cumulative_log_path".to_owned(),
            ));
        }
        check_label("output.host_label", &self.output.host_label)?;
        check_label("output.program_label", &self.output.program_label)?;

        // 아카이브
        check_path("archive.archive_dir", &self.archive.archive_dir)?;

        // 메트릭
        if self.metrics.enabled && self.metrics.endpoint != "/metrics" {
            return Err(invalid(
                "metrics.endpoint",
                "only '/metrics' is supported".to_owned(),
            ));
        }

        Ok(())
    }

    /// 출력 파일의 부모 디렉토리가 존재하는지 확인합니다.
    ///
    /// 로그 writer는 부모 디렉토리를 만들지 않으므로, 실행 전에 이 검증을 거쳐야 합니다.
    pub fn validate_paths(&self) -> Result<(), GvmshipError> {
        for (field, value) in [
            ("output.staging_path", &self.output.staging_path),
            (
                "output.cumulative_log_path",
                &self.output.cumulative_log_path,
            ),
        ] {
            let parent = Path::new(value)
                .parent()
                .filter(|p| !p.as_os_str().is_empty());
            if let Some(parent) = parent
                && !parent.is_dir()
            {
                return Err(invalid(
                    field,
                    format!("parent directory '{}' does not exist", parent.display()),
                ));
            }
        }

        if !Path::new(&self.export.work_dir).is_dir() {
            return Err(invalid(
                "export.work_dir",
                format!("directory '{}' does not exist", self.export.work_dir),
            ));
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// PID 파일 경로 (빈 문자열이면 사용하지 않음)
    pub pid_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            pid_file: "/var/run/gvmship.pid".to_owned(),
        }
    }
}

/// 트리거 HTTP 서버 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 바인드 주소
    pub host: String,
    /// 바인드 포트
    pub port: u16,
    /// IP 허용 목록 사용 여부
    pub allowlist_enabled: bool,
    /// 허용 IP 목록 파일 (한 줄에 하나)
    pub allowlist_path: String,
    /// 대기 가능한 트리거 수 (실행 중인 1건 제외)
    pub queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 5000,
            allowlist_enabled: true,
            allowlist_path: "/etc/gvmship/allowed_ips".to_owned(),
            queue_capacity: 1,
        }
    }
}

/// 리포트 export 설정
///
/// `gvm-script` 모드는 GMP 브리지 스크립트를 실행하고,
/// `file` 모드는 이미 export된 CSV 파일을 그대로 사용합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// export 방식 (gvm-script, file)
    pub mode: String,
    /// gvm-script 실행 파일
    pub gvm_script: String,
    /// sudo로 다른 사용자 권한에서 실행할지 여부
    pub use_sudo: bool,
    /// sudo 실행 사용자
    pub run_as_user: String,
    /// GMP 사용자명
    pub username: String,
    /// GMP 비밀번호
    pub password: String,
    /// gvm-script 연결 방식 (socket, ssh, tls)
    pub connection: String,
    /// export 스크립트 경로
    pub script_path: String,
    /// `file` 모드에서 사용할 CSV 경로
    pub source_file: String,
    /// export 결과를 둘 작업 디렉토리
    pub work_dir: String,
    /// export 타임아웃 (초)
    pub timeout_secs: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            mode: "gvm-script".to_owned(),
            gvm_script: "gvm-script".to_owned(),
            use_sudo: true,
            run_as_user: "_gvm".to_owned(),
            username: "admin".to_owned(),
            password: String::new(),
            connection: "socket".to_owned(),
            script_path: "/opt/gvmship/scripts/export-csv-report-latest.gmp.py".to_owned(),
            source_file: "/var/cache/gvmship/report.csv".to_owned(),
            work_dir: "/var/cache/gvmship".to_owned(),
            timeout_secs: 300,
        }
    }
}

/// 출력 로그 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// 실행마다 새로 쓰는 스테이징 파일
    pub staging_path: String,
    /// 모든 실행이 누적되는 로그 파일
    pub cumulative_log_path: String,
    /// 로그 라인의 호스트 레이블
    pub host_label: String,
    /// 로그 라인의 프로그램 레이블
    pub program_label: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            staging_path: "/var/cache/gvmship/temp".to_owned(),
            cumulative_log_path: "/var/log/gvmship/scans".to_owned(),
            host_label: "root".to_owned(),
            program_label: "openvas".to_owned(),
        }
    }
}

/// 아카이브 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// 날짜별 아카이브 파일을 둘 디렉토리
    pub archive_dir: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            archive_dir: "/var/log/gvmship/archive".to_owned(),
        }
    }
}

/// 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 리스닝 주소
    pub listen_addr: String,
    /// 리스닝 포트
    pub port: u16,
    /// 스크레이프 엔드포인트
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 검증 헬퍼 ---

fn invalid(field: &str, reason: String) -> GvmshipError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

fn check_path(field: &str, value: &str) -> Result<(), GvmshipError> {
    if value.is_empty() {
        return Err(invalid(field, "path must not be empty".to_owned()));
    }
    if value.len() > MAX_PATH_LEN {
        return Err(invalid(
            field,
            format!("path exceeds maximum length {MAX_PATH_LEN}"),
        ));
    }
    if Path::new(value)
        .components()
        .any(|c| c == Component::ParentDir)
    {
        return Err(invalid(
            field,
            format!("path '{value}' contains path traversal pattern '..'"),
        ));
    }
    Ok(())
}

fn check_label(field: &str, value: &str) -> Result<(), GvmshipError> {
    if value.is_empty() || value.chars().any(char::is_whitespace) {
        return Err(invalid(
            field,
            "must be non-empty and contain no whitespace".to_owned(),
        ));
    }
    Ok(())
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}
