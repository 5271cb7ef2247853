//! Out-of-band self-update: a half-hourly `git pull` in the install
//! directory. The supervisor only decides *that* a restart is warranted;
//! main performs the re-exec.

use chrono::{DateTime, Local, Timelike};
use std::path::Path;
use std::process::Command;

use crate::log;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateCheck {
    UpToDate,
    /// The working tree changed; the process should restart.
    Updated,
    Failed(String),
}

/// Fires once per half-hour slot, aligned to :00/:30. The first cycle
/// after a boundary triggers the check.
pub struct UpdateSchedule {
    last_slot: Option<i64>,
}

impl UpdateSchedule {
    /// Starts with the current slot marked as done, so a freshly started
    /// process does not immediately re-check (it just pulled on restart).
    pub fn new(now: DateTime<Local>) -> Self {
        Self {
            last_slot: Some(slot_of(now)),
        }
    }

    pub fn is_due(&mut self, now: DateTime<Local>) -> bool {
        let slot = slot_of(now);
        if self.last_slot == Some(slot) {
            return false;
        }
        self.last_slot = Some(slot);
        true
    }
}

fn slot_of(now: DateTime<Local>) -> i64 {
    // Two slots per hour: [:00, :30) and [:30, :00).
    let half = if now.minute() < 30 { 0 } else { 1 };
    now.timestamp() / 3600 * 2 + half
}

/// Runs `git pull --ff-only` in the install directory. Any error is
/// reported, logged by the caller, and ignored; the poll loop is only
/// blocked for the duration of the pull itself.
pub fn check_for_update(repo_dir: &Path) -> UpdateCheck {
    let output = Command::new("git")
        .args(["pull", "--ff-only"])
        .current_dir(repo_dir)
        .output();

    match output {
        Ok(out) if out.status.success() => {
            let stdout = String::from_utf8_lossy(&out.stdout);
            if pull_reports_changes(&stdout) {
                log("Update pulled; restart required");
                UpdateCheck::Updated
            } else {
                UpdateCheck::UpToDate
            }
        }
        Ok(out) => {
            let stderr = String::from_utf8_lossy(&out.stderr);
            UpdateCheck::Failed(format!("git pull failed: {}", stderr.trim()))
        }
        Err(e) => UpdateCheck::Failed(format!("git not available: {}", e)),
    }
}

/// True when the pull output indicates the working tree changed.
fn pull_reports_changes(stdout: &str) -> bool {
    let stdout = stdout.trim();
    !stdout.is_empty() && !stdout.contains("Already up to date")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 8, 28, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_not_due_within_starting_slot() {
        let mut schedule = UpdateSchedule::new(at(10, 5));
        assert!(!schedule.is_due(at(10, 12)));
        assert!(!schedule.is_due(at(10, 29)));
    }

    #[test]
    fn test_due_once_per_half_hour_slot() {
        let mut schedule = UpdateSchedule::new(at(10, 5));
        assert!(schedule.is_due(at(10, 30)));
        assert!(!schedule.is_due(at(10, 31)));
        assert!(!schedule.is_due(at(10, 59)));
        assert!(schedule.is_due(at(11, 0)));
        assert!(!schedule.is_due(at(11, 15)));
    }

    #[test]
    fn test_missed_slots_collapse_into_one_check() {
        let mut schedule = UpdateSchedule::new(at(10, 5));
        // If the loop was wedged past several boundaries, only one check
        // fires when it resumes.
        assert!(schedule.is_due(at(12, 7)));
        assert!(!schedule.is_due(at(12, 8)));
    }

    #[test]
    fn test_pull_output_parsing() {
        assert!(!pull_reports_changes("Already up to date.\n"));
        assert!(!pull_reports_changes(""));
        assert!(pull_reports_changes(
            "Updating 1a2b3c4..5d6e7f8\nFast-forward\n mate_monitor.rs | 4 ++--\n"
        ));
    }
}
