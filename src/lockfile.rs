//! Cooperative single-instance enforcement via a PID file.
//!
//! A new process reads the lock file, terminates whatever PID it names
//! (graceful first, forceful as fallback), waits briefly, and overwrites
//! the file with its own PID. There is an unguarded race window between
//! read and overwrite; at most one operator launches this at a time, so
//! it is accepted rather than papered over with heavier locking.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::log;

/// Reads the PID recorded in the lock file. Garbage or a missing file is
/// treated as "no live instance".
pub fn read_pid(path: &Path) -> Option<u32> {
    let raw = fs::read_to_string(path).ok()?;
    raw.trim().parse().ok()
}

pub fn write_pid(path: &Path, pid: u32) -> Result<()> {
    fs::write(path, pid.to_string())
        .with_context(|| format!("Failed to write lock file {}", path.display()))
}

pub fn release(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            log(&format!("Failed to remove lock file: {}", e));
        }
    }
}

/// Takes over the lock: kills any previously recorded instance, then
/// records our own PID.
pub fn acquire(path: &Path) -> Result<()> {
    let own_pid = std::process::id();

    if let Some(pid) = read_pid(path) {
        if pid != own_pid && is_process_running(pid) {
            log(&format!("Terminating previous instance (pid {})", pid));
            terminate_process(pid);
            std::thread::sleep(Duration::from_millis(1500));
        }
    }

    write_pid(path, own_pid)?;
    log(&format!("Lock acquired (pid {})", own_pid));
    Ok(())
}

#[cfg(windows)]
fn is_process_running(pid: u32) -> bool {
    use windows::Win32::Foundation::CloseHandle;
    use windows::Win32::System::Threading::{OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION};

    unsafe {
        match OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid) {
            Ok(handle) => {
                let _ = CloseHandle(handle);
                true
            }
            Err(_) => false,
        }
    }
}

#[cfg(not(windows))]
fn is_process_running(_pid: u32) -> bool {
    false
}

/// Asks the process to exit, then kills it if it is still around.
#[cfg(windows)]
fn terminate_process(pid: u32) {
    use std::process::Command;

    let graceful = Command::new("taskkill")
        .args(["/PID", &pid.to_string()])
        .output();
    if matches!(&graceful, Ok(out) if out.status.success()) {
        return;
    }

    let forced = Command::new("taskkill")
        .args(["/F", "/PID", &pid.to_string()])
        .output();
    if let Err(e) = forced {
        log(&format!("Failed to kill previous instance {}: {}", pid, e));
    }
}

#[cfg(not(windows))]
fn terminate_process(_pid: u32) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pid_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor.pid");
        write_pid(&path, 4242).unwrap();
        assert_eq!(read_pid(&path), Some(4242));
    }

    #[test]
    fn test_garbage_lock_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor.pid");
        fs::write(&path, "not a pid\n").unwrap();
        assert_eq!(read_pid(&path), None);
    }

    #[test]
    fn test_missing_lock_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_pid(&dir.path().join("monitor.pid")), None);
    }

    #[test]
    fn test_release_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        release(&dir.path().join("monitor.pid"));
    }
}
