//! PID file helpers shared by `start`, `stop`, `reload` and `status`.

use std::path::Path;
use std::time::Duration;

use tracing::warn;

/// Poll interval while waiting for a process to exit.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Read a PID file. `Ok(None)` when the file does not exist.
pub fn read_pid(path: &Path) -> std::io::Result<Option<u32>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    match content.trim().parse::<u32>() {
        Ok(pid) => Ok(Some(pid)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "malformed PID file");
            Ok(None)
        }
    }
}

/// Remove a PID file, treating an already-missing file as success.
pub fn remove_pid_file(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Wait until `pid` is gone. Returns `false` if it is still alive after `timeout`.
pub async fn wait_for_exit(pid: u32, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while is_process_alive(pid) {
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(EXIT_POLL_INTERVAL).await;
    }
    true
}

/// Check if a process with the given PID is alive.
#[cfg(unix)]
pub fn is_process_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };

    // SAFETY: kill(2) with signal 0 performs only the existence and permission check
    let result = unsafe { libc::kill(pid, 0) };
    if result == 0 {
        return true;
    }
    // EPERM: the process exists but belongs to another user
    std::io::Error::last_os_error().kind() == std::io::ErrorKind::PermissionDenied
}

#[cfg(not(unix))]
pub fn is_process_alive(_pid: u32) -> bool {
    warn!("process liveness check not supported on this platform");
    false
}

/// Send SIGTERM to `pid`.
#[cfg(unix)]
pub fn terminate(pid: u32) -> std::io::Result<()> {
    let pid = libc::pid_t::try_from(pid)
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "PID out of range"))?;

    // SAFETY: kill(2) with a validated PID and SIGTERM has no memory-safety preconditions
    let result = unsafe { libc::kill(pid, libc::SIGTERM) };
    if result == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
pub fn terminate(_pid: u32) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "signals not supported on this platform",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_pid_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_pid(&dir.path().join("absent.pid")).unwrap(), None);
    }

    #[test]
    fn read_pid_parses_trimmed_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gvmship.pid");
        std::fs::write(&path, "4242\n").unwrap();
        assert_eq!(read_pid(&path).unwrap(), Some(4242));
    }

    #[test]
    fn read_pid_malformed_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gvmship.pid");
        std::fs::write(&path, "not a pid").unwrap();
        assert_eq!(read_pid(&path).unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn current_process_is_alive() {
        assert!(is_process_alive(std::process::id()));
    }

    #[cfg(unix)]
    #[test]
    fn out_of_range_pid_is_not_alive() {
        assert!(!is_process_alive(u32::MAX));
    }

    #[test]
    fn remove_pid_file_ignores_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gvmship.pid");
        remove_pid_file(&path).unwrap();
        std::fs::write(&path, "1").unwrap();
        remove_pid_file(&path).unwrap();
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn wait_for_exit_times_out_on_live_process() {
        assert!(!wait_for_exit(std::process::id(), Duration::from_millis(200)).await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn wait_for_exit_sees_reaped_child() {
        let mut child = tokio::process::Command::new("sleep")
            .arg("0.2")
            .spawn()
            .unwrap();
        let pid = child.id().unwrap();
        let reaper = tokio::spawn(async move { child.wait().await.unwrap() });

        assert!(wait_for_exit(pid, Duration::from_secs(5)).await);
        assert!(reaper.await.unwrap().success());
    }
}
