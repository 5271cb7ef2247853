//! The resilience supervisor: one sequential poll loop that owns the
//! window handle and the last-published count, health-checks every cycle,
//! and degrades instead of dying when the target window goes away.

use chrono::Local;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::errors::MonitorError;
use crate::extract::Evidence;
use crate::log;
use crate::paths;
use crate::publish::{ChangeDetector, StatusSink};
use crate::update::{self, UpdateCheck, UpdateSchedule};

/// Global shutdown flag, set by the console Ctrl+C handler.
pub static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

pub fn request_shutdown() {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}

/// Everything the supervisor needs from the platform layer. The Windows
/// implementation lives in `window::MateDriver`; tests drive the state
/// machine with a scripted fake.
pub trait PosDriver {
    type Handle;

    /// Attempts to acquire the target window, dismissing any interfering
    /// popup along the way.
    fn resolve(&mut self) -> Option<Self::Handle>;
    fn is_alive(&mut self, handle: &Self::Handle) -> bool;
    /// Restores the window if minimized; returns whether a restore ran.
    fn ensure_visible(&mut self, handle: &Self::Handle) -> bool;
    /// Per-cycle preparation (selecting the delivery tab) that must not
    /// fight a human operator for the mouse.
    fn prepare(&mut self, handle: &Self::Handle);
    /// Layered extraction: structured text first, then the visual path.
    fn read_count(&mut self, handle: &Self::Handle) -> Result<Evidence, MonitorError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Starting,
    Connected,
    Degraded,
    Stopped,
}

/// Why `run` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Operator cancellation; exit cleanly.
    Stopped,
    /// A code update was pulled; the caller should re-exec the process.
    RestartRequested,
}

pub struct Supervisor<D: PosDriver, S: StatusSink> {
    driver: D,
    sink: S,
    detector: ChangeDetector,
    state: SupervisorState,
    handle: Option<D::Handle>,
    poll_interval: Duration,
    /// Consecutive cycles where extraction produced no count while the
    /// handle stayed healthy. Throttles diagnostics only.
    miss_streak: u32,
}

impl<D: PosDriver, S: StatusSink> Supervisor<D, S> {
    pub fn new(driver: D, sink: S, initial_handle: Option<D::Handle>, poll_interval: Duration) -> Self {
        let state = if initial_handle.is_some() {
            SupervisorState::Connected
        } else {
            SupervisorState::Starting
        };
        Self {
            driver,
            sink,
            detector: ChangeDetector::new(),
            state,
            handle: initial_handle,
            poll_interval,
            miss_streak: 0,
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn last_published(&self) -> i64 {
        self.detector.last_published()
    }

    #[cfg(test)]
    fn miss_streak(&self) -> u32 {
        self.miss_streak
    }

    /// Runs the poll loop until cancelled or a restart is warranted.
    pub fn run(&mut self) -> RunOutcome {
        let mut schedule = UpdateSchedule::new(Local::now());
        log(&format!(
            "Monitoring every {}s (Ctrl+C to stop)",
            self.poll_interval.as_secs()
        ));

        loop {
            if SHUTDOWN_REQUESTED.load(Ordering::SeqCst) {
                self.state = SupervisorState::Stopped;
                log("Monitoring stopped");
                return RunOutcome::Stopped;
            }

            if schedule.is_due(Local::now()) {
                match update::check_for_update(paths::get_exe_dir()) {
                    UpdateCheck::Updated => return RunOutcome::RestartRequested,
                    UpdateCheck::UpToDate => {}
                    UpdateCheck::Failed(reason) => {
                        log(&format!("Update check failed (ignored): {}", reason));
                    }
                }
            }

            self.run_cycle();
            self.sleep_interruptible();
        }
    }

    /// One poll cycle. Every recoverable failure ends here; nothing
    /// escapes to terminate the loop.
    pub fn run_cycle(&mut self) {
        // Health check; reacquire on loss.
        let healthy = match &self.handle {
            Some(handle) => self.driver.is_alive(handle),
            None => false,
        };

        if !healthy {
            if self.state == SupervisorState::Connected {
                log("POS window lost, reconnecting...");
            }
            self.state = SupervisorState::Degraded;
            self.handle = None;

            match self.driver.resolve() {
                Some(handle) => {
                    self.handle = Some(handle);
                    self.state = SupervisorState::Connected;
                }
                None => return, // stay Degraded, retry next cycle
            }
        } else {
            self.state = SupervisorState::Connected;
        }

        let Some(handle) = self.handle.take() else {
            return;
        };

        self.driver.ensure_visible(&handle);
        self.driver.prepare(&handle);

        match self.driver.read_count(&handle) {
            Ok(evidence) => {
                self.miss_streak = 0;
                log(&format!(
                    "Observed {} active orders [{}]",
                    evidence.count, evidence.matched
                ));
                self.detector.on_observation(evidence.count, &self.sink);
                self.handle = Some(handle);
            }
            Err(MonitorError::Acquisition(reason)) => {
                log(&format!("Window lost during read: {}", reason));
                self.state = SupervisorState::Degraded;
            }
            Err(e) => {
                self.miss_streak += 1;
                if self.miss_streak % 10 == 1 {
                    log(&format!(
                        "No order count this cycle ({} consecutive): {}",
                        self.miss_streak, e
                    ));
                }
                self.handle = Some(handle);
            }
        }
    }

    /// Sleeps the poll interval in short slices so Ctrl+C stops the loop
    /// promptly instead of waiting out the interval.
    fn sleep_interruptible(&self) {
        let slice = Duration::from_millis(200);
        let mut remaining = self.poll_interval;
        while remaining > Duration::ZERO {
            if SHUTDOWN_REQUESTED.load(Ordering::SeqCst) {
                return;
            }
            let step = remaining.min(slice);
            std::thread::sleep(step);
            remaining -= step;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::PublishedState;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    struct NullSink;
    impl StatusSink for NullSink {
        fn push(&self, _state: &PublishedState) -> bool {
            true
        }
    }

    struct CountingSink {
        pushed: RefCell<Vec<i64>>,
    }
    impl StatusSink for CountingSink {
        fn push(&self, state: &PublishedState) -> bool {
            self.pushed.borrow_mut().push(state.count);
            true
        }
    }

    /// Scripted driver: per-cycle liveness and read results.
    struct FakeDriver {
        alive: VecDeque<bool>,
        resolves: VecDeque<bool>,
        reads: VecDeque<Result<u32, MonitorError>>,
    }

    impl FakeDriver {
        fn new() -> Self {
            Self {
                alive: VecDeque::new(),
                resolves: VecDeque::new(),
                reads: VecDeque::new(),
            }
        }
    }

    impl PosDriver for FakeDriver {
        type Handle = ();

        fn resolve(&mut self) -> Option<()> {
            if self.resolves.pop_front().unwrap_or(false) {
                Some(())
            } else {
                None
            }
        }
        fn is_alive(&mut self, _handle: &()) -> bool {
            self.alive.pop_front().unwrap_or(true)
        }
        fn ensure_visible(&mut self, _handle: &()) -> bool {
            false
        }
        fn prepare(&mut self, _handle: &()) {}
        fn read_count(&mut self, _handle: &()) -> Result<Evidence, MonitorError> {
            match self.reads.pop_front().unwrap_or(Err(MonitorError::ExtractionMiss)) {
                Ok(count) => Ok(Evidence {
                    count,
                    matched: format!("처리중 {}", count),
                }),
                Err(e) => Err(e),
            }
        }
    }

    fn supervisor(driver: FakeDriver) -> Supervisor<FakeDriver, CountingSink> {
        let sink = CountingSink {
            pushed: RefCell::new(Vec::new()),
        };
        Supervisor::new(driver, sink, Some(()), Duration::from_secs(30))
    }

    #[test]
    fn test_healthy_cycle_publishes_observation() {
        let mut driver = FakeDriver::new();
        driver.reads.push_back(Ok(3));
        let mut sup = supervisor(driver);

        sup.run_cycle();
        assert_eq!(sup.state(), SupervisorState::Connected);
        assert_eq!(sup.last_published(), 3);
        assert_eq!(*sup.sink.pushed.borrow(), vec![3]);
    }

    #[test]
    fn test_handle_loss_degrades_then_reconnects_keeping_last_published() {
        let mut driver = FakeDriver::new();
        driver.reads.push_back(Ok(3)); // cycle 1: healthy
        driver.alive.push_back(true);
        driver.alive.push_back(false); // cycle 2: handle lost
        driver.resolves.push_back(false); //   and re-resolve fails
        driver.resolves.push_back(true); // cycle 3: re-resolve succeeds
        driver.reads.push_back(Ok(3)); //   same count as before
        let mut sup = supervisor(driver);

        sup.run_cycle();
        assert_eq!(sup.state(), SupervisorState::Connected);

        sup.run_cycle();
        assert_eq!(sup.state(), SupervisorState::Degraded);
        assert_eq!(sup.last_published(), 3, "degradation keeps last published");

        sup.run_cycle();
        assert_eq!(sup.state(), SupervisorState::Connected);
        // Unchanged count after reconnect: no second publish.
        assert_eq!(sup.sink.pushed.borrow().len(), 1);
    }

    #[test]
    fn test_miss_streak_counts_and_resets() {
        let mut driver = FakeDriver::new();
        driver.reads.push_back(Err(MonitorError::ExtractionMiss));
        driver.reads.push_back(Err(MonitorError::Capture("gone".into())));
        driver.reads.push_back(Ok(2));
        let mut sup = supervisor(driver);

        sup.run_cycle();
        sup.run_cycle();
        assert_eq!(sup.miss_streak(), 2);
        assert_eq!(sup.state(), SupervisorState::Connected, "misses never change state");

        sup.run_cycle();
        assert_eq!(sup.miss_streak(), 0);
        assert_eq!(sup.last_published(), 2);
    }

    #[test]
    fn test_acquisition_error_mid_read_degrades() {
        let mut driver = FakeDriver::new();
        driver
            .reads
            .push_back(Err(MonitorError::Acquisition("destroyed".into())));
        let mut sup = supervisor(driver);

        sup.run_cycle();
        assert_eq!(sup.state(), SupervisorState::Degraded);
    }

    #[test]
    fn test_starting_without_handle_resolves_first() {
        let mut driver = FakeDriver::new();
        driver.resolves.push_back(true);
        driver.reads.push_back(Ok(1));
        let sink = NullSink;
        let mut sup = Supervisor::new(driver, sink, None, Duration::from_secs(30));
        assert_eq!(sup.state(), SupervisorState::Starting);

        sup.run_cycle();
        assert_eq!(sup.state(), SupervisorState::Connected);
        assert_eq!(sup.last_published(), 1);
    }
}
