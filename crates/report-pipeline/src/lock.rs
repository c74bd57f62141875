//! 누적 로그 파일 잠금
//!
//! [`LogFile`]은 파일 경로 하나와 그 파일 전용 비동기 뮤텍스를 묶은 핸들입니다.
//! 같은 파일을 다루는 writer와 rotator는 반드시 같은 핸들(의 clone)을 공유해야 합니다.
//!
//! 프로세스 내부 직렬화는 뮤텍스가, 다른 프로세스(cron으로 실행된 `gvmship archive` 등)와의
//! 직렬화는 열린 파일에 대한 `flock(2)` 배타 잠금이 담당합니다.
//!
//! [`RunLock`]은 ship 실행 하나 전체(export부터 누적 로그 기록까지)를 감싸는 잠금입니다.
//! 데몬과 `gvmship ship`이 같은 export 파일과 스테이징 파일을 공유하므로
//! 두 실행이 겹치지 않도록 `<export_dir>/.ship.lock`에 대한 `flock`으로 직렬화합니다.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// 실행 잠금 파일명
pub const RUN_LOCK_FILE: &str = ".ship.lock";

/// 잠금을 공유하는 로그 파일 핸들
#[derive(Debug, Clone)]
pub struct LogFile {
    path: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
}

impl LogFile {
    /// 새 핸들을 생성합니다. 파일은 만들지 않습니다.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Arc::new(path.into()),
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// 파일 경로
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 프로세스 내부 잠금을 획득합니다.
    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().await
    }

    /// 두 핸들이 같은 잠금을 공유하는지 여부
    pub fn shares_lock_with(&self, other: &LogFile) -> bool {
        Arc::ptr_eq(&self.lock, &other.lock)
    }
}

/// 열린 파일에 대한 배타 advisory 잠금 (drop 시 해제)
pub(crate) struct FileLock<'a> {
    file: &'a File,
}

impl<'a> FileLock<'a> {
    /// 배타 잠금을 획득할 때까지 블록합니다.
    pub(crate) fn exclusive(file: &'a File) -> std::io::Result<Self> {
        flock(file, Flock::Exclusive)?;
        Ok(Self { file })
    }
}

impl Drop for FileLock<'_> {
    fn drop(&mut self) {
        unlock(self.file);
    }
}

/// ship 실행 전체에 대한 프로세스 간 배타 잠금 (drop 시 해제)
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// 잠금을 획득합니다. 다른 실행이 잡고 있으면 끝날 때까지 기다립니다.
    ///
    /// 잠금 파일이 없으면 만들지만 디렉토리는 만들지 않습니다.
    pub async fn acquire(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        tokio::task::spawn_blocking(move || Self::acquire_blocking(path))
            .await
            .map_err(|e| std::io::Error::other(format!("run lock task failed: {e}")))?
    }

    fn acquire_blocking(path: PathBuf) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;

        if !flock(&file, Flock::TryExclusive)? {
            info!(lock = %path.display(), "another ship run in progress, waiting");
            flock(&file, Flock::Exclusive)?;
        }
        debug!(lock = %path.display(), "run lock acquired");
        Ok(Self { file, path })
    }

    /// 잠금 파일 경로
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        unlock(&self.file);
    }
}

#[derive(Clone, Copy)]
enum Flock {
    Exclusive,
    TryExclusive,
}

/// `flock(2)`. `TryExclusive`에서 다른 holder가 있으면 `Ok(false)`.
#[cfg(unix)]
fn flock(file: &File, op: Flock) -> std::io::Result<bool> {
    use std::os::unix::io::AsRawFd;

    let operation = match op {
        Flock::Exclusive => libc::LOCK_EX,
        Flock::TryExclusive => libc::LOCK_EX | libc::LOCK_NB,
    };
    loop {
        // SAFETY: fd는 `file`이 살아있는 동안 유효하며, flock(2)은 메모리를 건드리지 않습니다.
        let rc = unsafe { libc::flock(file.as_raw_fd(), operation) };
        if rc == 0 {
            return Ok(true);
        }
        let err = std::io::Error::last_os_error();
        match err.kind() {
            std::io::ErrorKind::Interrupted => continue,
            std::io::ErrorKind::WouldBlock => return Ok(false),
            _ => return Err(err),
        }
    }
}

#[cfg(not(unix))]
fn flock(_file: &File, _op: Flock) -> std::io::Result<bool> {
    Ok(true)
}

fn unlock(file: &File) {
    #[cfg(unix)]
    {
        use std::os::unix::io::AsRawFd;
        // SAFETY: 위와 동일. 해제 실패는 fd close 시 커널이 정리합니다.
        unsafe {
            libc::flock(file.as_raw_fd(), libc::LOCK_UN);
        }
    }
    #[cfg(not(unix))]
    let _ = file;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_lock() {
        let a = LogFile::new("/tmp/scans");
        let b = a.clone();
        let c = LogFile::new("/tmp/scans");
        assert!(a.shares_lock_with(&b));
        assert!(!a.shares_lock_with(&c));
        assert_eq!(b.path(), Path::new("/tmp/scans"));
    }

    #[tokio::test]
    async fn lock_is_exclusive_in_process() {
        let log = LogFile::new("/tmp/scans");
        let guard = log.lock().await;
        assert!(log.lock.try_lock().is_err());
        drop(guard);
        assert!(log.lock.try_lock().is_ok());
    }

    #[test]
    fn file_lock_acquire_and_release() {
        let file = tempfile::tempfile().unwrap();
        {
            let _lock = FileLock::exclusive(&file).unwrap();
        }
        // 해제 후 다시 획득 가능
        let _lock = FileLock::exclusive(&file).unwrap();
    }

    #[tokio::test]
    async fn run_lock_creates_file_and_reacquires_after_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(RUN_LOCK_FILE);
        let lock = RunLock::acquire(&path).await.unwrap();
        assert!(path.is_file());
        assert_eq!(lock.path(), path);
        drop(lock);
        RunLock::acquire(&path).await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn run_lock_excludes_second_open_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(RUN_LOCK_FILE);
        let held = RunLock::acquire(&path).await.unwrap();

        // 별도로 연 파일은 다른 open file description이므로 잠금이 충돌해야 함
        let other = File::options().write(true).open(&path).unwrap();
        assert!(!flock(&other, Flock::TryExclusive).unwrap());

        drop(held);
        assert!(flock(&other, Flock::TryExclusive).unwrap());
    }

    #[tokio::test]
    async fn run_lock_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = RunLock::acquire(dir.path().join("missing").join(RUN_LOCK_FILE)).await;
        assert!(result.is_err());
    }
}
