//! Error taxonomy for the monitor loop.
//!
//! Every variant except `FatalDependencyMissing` is recoverable and is
//! swallowed at the cycle boundary by the supervisor.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    /// Target window not found or lost. Drives the Degraded state and is
    /// retried every cycle indefinitely.
    #[error("window not acquired: {0}")]
    Acquisition(String),

    /// Window capture failed (handle destroyed mid-capture, device loss).
    /// Treated as "no observation this cycle".
    #[error("window capture failed: {0}")]
    Capture(String),

    /// Capture or tree read succeeded but no pattern produced a count.
    /// Counted only for diagnostic log throttling.
    #[error("no order count matched this cycle")]
    ExtractionMiss,

    /// Required recognition engine absent at startup. Not recoverable;
    /// surfaced to the operator and the process exits.
    #[error("required dependency missing: {0}")]
    FatalDependencyMissing(String),
}
