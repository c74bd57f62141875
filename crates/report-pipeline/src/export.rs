//! 리포트 export 어댑터
//!
//! [`ReportExporter`]는 "최신 리포트를 `<stem>.csv`로 만들어 달라"는 단일 연산을
//! 추상화합니다. 운영에서는 [`GvmScriptExporter`]가 GMP 브리지 스크립트를 실행하고,
//! 오프라인 재전송과 테스트에서는 [`FileExporter`]가 고정 CSV를 복사합니다.
//!
//! ```text
//!  ShipOrchestrator
//!         │
//!         ▼
//!  ReportExporter (trait)
//!     │         │
//!     ▼         ▼
//! GvmScript   File
//!     │
//!     ▼
//! [sudo -u USER] gvm-script ... socket export-csv-report-latest.gmp.py <stem>
//! ```

use std::ffi::OsString;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use gvmship_core::config::ExportConfig;
use tracing::{debug, info, warn};

use crate::error::ShipError;

/// 에러 메시지에 포함할 stderr 최대 길이
const STDERR_EXCERPT_LEN: usize = 512;

/// `<stem>.csv` 경로를 만듭니다.
pub fn csv_path(stem: &Path) -> PathBuf {
    let mut name = OsString::from(stem.as_os_str());
    name.push(".csv");
    PathBuf::from(name)
}

/// 리포트 export 추상화
pub trait ReportExporter: Send + Sync + 'static {
    /// 최신 리포트를 `<dest_stem>.csv`로 만들고 그 경로를 반환합니다.
    fn export(&self, dest_stem: &Path)
    -> impl Future<Output = Result<PathBuf, ShipError>> + Send;

    /// 로그용 이름
    fn name(&self) -> &'static str;
}

/// `gvm-script` 실행 export
#[derive(Clone)]
pub struct GvmScriptExporter {
    program: String,
    run_as: Option<String>,
    username: String,
    password: String,
    connection: String,
    script_path: PathBuf,
    timeout: Duration,
}

impl fmt::Debug for GvmScriptExporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GvmScriptExporter")
            .field("program", &self.program)
            .field("run_as", &self.run_as)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("connection", &self.connection)
            .field("script_path", &self.script_path)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GvmScriptExporter {
    /// core export 설정에서 생성합니다.
    pub fn from_config(config: &ExportConfig) -> Self {
        Self {
            program: config.gvm_script.clone(),
            run_as: config
                .use_sudo
                .then(|| config.run_as_user.clone())
                .filter(|u| !u.is_empty()),
            username: config.username.clone(),
            password: config.password.clone(),
            connection: config.connection.clone(),
            script_path: PathBuf::from(&config.script_path),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// 실행 파일을 바꿉니다.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// 타임아웃을 바꿉니다.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 다른 GMP 스크립트가 있는 디렉토리 (`script_path`의 부모)
    pub fn scripts_dir(&self) -> &Path {
        self.script_path.parent().unwrap_or(Path::new("."))
    }

    /// export 명령의 프로그램과 인자 목록을 만듭니다.
    fn command_line(&self, dest_stem: &Path) -> (String, Vec<OsString>) {
        self.script_command_line(&self.script_path, [dest_stem.as_os_str().to_owned()])
    }

    /// 임의의 GMP 스크립트 실행 명령을 만듭니다.
    ///
    /// `[sudo -u USER] <program> --gmp-username U --gmp-password P <connection> <script> <args...>`
    fn script_command_line(
        &self,
        script: &Path,
        extra: impl IntoIterator<Item = OsString>,
    ) -> (String, Vec<OsString>) {
        let mut args: Vec<OsString> = Vec::new();
        let program = match &self.run_as {
            Some(user) => {
                args.extend(["-u".into(), user.into(), self.program.clone().into()]);
                "sudo".to_owned()
            }
            None => self.program.clone(),
        };
        args.extend([
            OsString::from("--gmp-username"),
            OsString::from(&self.username),
            OsString::from("--gmp-password"),
            OsString::from(&self.password),
            OsString::from(&self.connection),
            script.as_os_str().to_owned(),
        ]);
        args.extend(extra);
        (program, args)
    }

    /// `scripts_dir` 아래의 GMP 스크립트를 인자와 함께 실행하고 출력을 모아 반환합니다.
    ///
    /// 종료 코드는 해석하지 않습니다. export와 같은 타임아웃이 적용됩니다.
    pub async fn run_script(
        &self,
        name: &str,
        extra: &[String],
    ) -> Result<ScriptOutput, ShipError> {
        let script = self.resolve_script(name)?;
        let (program, args) =
            self.script_command_line(&script, extra.iter().map(OsString::from));
        info!(
            program = %program,
            run_as = ?self.run_as,
            script = %script.display(),
            args = extra.len(),
            "running gmp script"
        );

        let mut command = tokio::process::Command::new(&program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ShipError::ExportFailed {
                    reason: format!("failed to start {program}: {e}"),
                });
            }
            Err(_) => {
                return Err(ShipError::ExportTimeout {
                    timeout: self.timeout,
                });
            }
        };

        Ok(ScriptOutput {
            script,
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// 스크립트 이름을 `scripts_dir` 기준 경로로 바꿉니다. `..`는 거부합니다.
    fn resolve_script(&self, name: &str) -> Result<PathBuf, ShipError> {
        let name = Path::new(name);
        if name.as_os_str().is_empty()
            || name
                .components()
                .any(|c| c == std::path::Component::ParentDir)
        {
            return Err(ShipError::Config {
                field: "script".to_owned(),
                reason: format!("invalid script name '{}'", name.display()),
            });
        }
        Ok(self.scripts_dir().join(name))
    }
}

/// [`GvmScriptExporter::run_script`] 실행 결과
#[derive(Debug, Clone, serde::Serialize)]
pub struct ScriptOutput {
    /// 실행한 스크립트 경로
    pub script: PathBuf,
    /// 종료 코드 (시그널로 종료되면 `None`)
    pub exit_code: Option<i32>,
    /// 표준 출력
    pub stdout: String,
    /// 표준 에러
    pub stderr: String,
}

impl ScriptOutput {
    /// 종료 코드 0으로 끝났는지 여부
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

impl ReportExporter for GvmScriptExporter {
    async fn export(&self, dest_stem: &Path) -> Result<PathBuf, ShipError> {
        let output_path = csv_path(dest_stem);
        remove_stale(&output_path).await?;

        let (program, args) = self.command_line(dest_stem);
        // 비밀번호가 포함된 인자 목록은 기록하지 않음
        info!(
            program = %program,
            run_as = ?self.run_as,
            script = %self.script_path.display(),
            stem = %dest_stem.display(),
            "running report export"
        );

        let mut command = tokio::process::Command::new(&program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ShipError::ExportFailed {
                    reason: format!("failed to start {program}: {e}"),
                });
            }
            Err(_) => {
                warn!(
                    timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                    "report export timed out"
                );
                return Err(ShipError::ExportTimeout {
                    timeout: self.timeout,
                });
            }
        };

        if !output.status.success() {
            return Err(ShipError::ExportFailed {
                reason: format!(
                    "{program} exited with {}: {}",
                    output.status,
                    stderr_excerpt(&output.stderr)
                ),
            });
        }

        if !tokio::fs::try_exists(&output_path).await.unwrap_or(false) {
            return Err(ShipError::ExportFailed {
                reason: format!(
                    "export finished but {} was not produced",
                    output_path.display()
                ),
            });
        }

        debug!(path = %output_path.display(), "report export produced");
        Ok(output_path)
    }

    fn name(&self) -> &'static str {
        "gvm-script"
    }
}

/// 고정 CSV 파일을 복사하는 export
#[derive(Debug, Clone)]
pub struct FileExporter {
    source: PathBuf,
}

impl FileExporter {
    /// 원본 CSV 경로로 생성합니다.
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// 원본 CSV 경로
    pub fn source(&self) -> &Path {
        &self.source
    }
}

impl ReportExporter for FileExporter {
    async fn export(&self, dest_stem: &Path) -> Result<PathBuf, ShipError> {
        let output_path = csv_path(dest_stem);

        if !tokio::fs::try_exists(&self.source).await.unwrap_or(false) {
            return Err(ShipError::ExportFailed {
                reason: format!("source report {} does not exist", self.source.display()),
            });
        }

        // 원본과 대상이 같은 파일이면 복사하지 않음 (자기 자신으로의 복사는 내용을 지움)
        if same_file(&self.source, &output_path).await {
            return Ok(output_path);
        }

        tokio::fs::copy(&self.source, &output_path)
            .await
            .map_err(|e| ShipError::ExportFailed {
                reason: format!(
                    "failed to copy {} to {}: {e}",
                    self.source.display(),
                    output_path.display()
                ),
            })?;

        debug!(
            source = %self.source.display(),
            path = %output_path.display(),
            "report copied"
        );
        Ok(output_path)
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/// 설정으로 선택되는 export 구현
#[derive(Debug, Clone)]
pub enum Exporter {
    /// `gvm-script` 실행
    GvmScript(GvmScriptExporter),
    /// 고정 파일 복사
    File(FileExporter),
}

impl Exporter {
    /// `export.mode`에 따라 구현을 선택합니다.
    pub fn from_config(config: &ExportConfig) -> Result<Self, ShipError> {
        match config.mode.as_str() {
            "gvm-script" => Ok(Self::GvmScript(GvmScriptExporter::from_config(config))),
            "file" => Ok(Self::File(FileExporter::new(&config.source_file))),
            other => Err(ShipError::Config {
                field: "export.mode".to_owned(),
                reason: format!("unknown export mode '{other}'"),
            }),
        }
    }
}

impl ReportExporter for Exporter {
    async fn export(&self, dest_stem: &Path) -> Result<PathBuf, ShipError> {
        match self {
            Self::GvmScript(e) => e.export(dest_stem).await,
            Self::File(e) => e.export(dest_stem).await,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::GvmScript(e) => e.name(),
            Self::File(e) => e.name(),
        }
    }
}

async fn remove_stale(path: &Path) -> Result<(), ShipError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!(path = %path.display(), "removed stale export");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ShipError::ExportFailed {
            reason: format!("cannot remove stale export {}: {e}", path.display()),
        }),
    }
}

async fn same_file(a: &Path, b: &Path) -> bool {
    match (
        tokio::fs::canonicalize(a).await,
        tokio::fs::canonicalize(b).await,
    ) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn stderr_excerpt(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.len() <= STDERR_EXCERPT_LEN {
        return text.to_owned();
    }
    let mut start = text.len() - STDERR_EXCERPT_LEN;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &text[start..])
}
