//! Execution engines
//!
//! The coordinator decides *whether* and *when* a transition runs; how the
//! machine actually sleeps belongs to the engines behind these traits:
//!
//! - `SuspendEngine`: freeze / standby / suspend-to-RAM
//! - `HibernationEngine`: suspend-to-disk (optional capability)
//! - `Freezer`: opt-out of task freezing for threads that must keep running
//!
//! `SimulatedPlatform` implements both engines in-process.

mod simulated;

pub use simulated::{SimulatedEntry, SimulatedPlatform};

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use uuid::Uuid;

use crate::errors::errno;
use crate::notifier::{NotifierChain, NotifierError, PmEvent};
use crate::state::{SleepState, TestLevel};
use crate::wakeup::WakeupCountGuard;

/// Phase of a transition in which a failure was reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuspendPhase {
    Freeze,
    Prepare,
    Suspend,
    SuspendLate,
    SuspendNoirq,
    ResumeNoirq,
    ResumeEarly,
    Resume,
}

impl SuspendPhase {
    pub fn name(&self) -> &'static str {
        match self {
            SuspendPhase::Freeze => "freeze",
            SuspendPhase::Prepare => "prepare",
            SuspendPhase::Suspend => "suspend",
            SuspendPhase::SuspendLate => "suspend_late",
            SuspendPhase::SuspendNoirq => "suspend_noirq",
            SuspendPhase::ResumeNoirq => "resume_noirq",
            SuspendPhase::ResumeEarly => "resume_early",
            SuspendPhase::Resume => "resume",
        }
    }
}

impl fmt::Display for SuspendPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Failure reported by an engine.
///
/// `code` is a negative errno and is returned to the caller unchanged. A
/// non-negative code is reported as `-EIO`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DelegateFailure {
    pub code: i32,
    pub phase: SuspendPhase,
    pub device: Option<String>,
}

impl DelegateFailure {
    pub fn new(code: i32, phase: SuspendPhase) -> Self {
        let code = if code < 0 { code } else { -errno::EIO };
        Self {
            code,
            phase,
            device: None,
        }
    }

    /// Attribute the failure to a device.
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    /// A notifier veto during the prepare phase.
    pub fn from_veto(veto: NotifierError) -> Self {
        Self::new(veto.code, SuspendPhase::Prepare)
    }
}

/// Everything an engine may consult while running one transition.
pub struct TransitionContext<'a> {
    /// Correlates log lines of one request.
    pub request_id: Uuid,
    pub notifiers: &'a NotifierChain,
    pub wakeup: &'a WakeupCountGuard,
    pub test_level: TestLevel,
    /// Suspend/resume devices asynchronously (`pm_async`).
    pub async_devices: bool,
    pub freeze_timeout: Duration,
    /// Save a trace hash of the last device touched (`pm_trace`).
    pub trace: bool,
}

impl TransitionContext<'_> {
    /// Notify the chain, turning a veto into a prepare-phase failure.
    pub fn notify(&self, event: PmEvent) -> Result<(), DelegateFailure> {
        self.notifiers.notify(event).map_err(DelegateFailure::from_veto)
    }
}

/// Executes freeze, standby and suspend-to-RAM.
pub trait SuspendEngine: Send + Sync {
    /// Run the transition to `state` and return once the system is awake
    /// again.
    fn suspend(&self, state: SleepState, ctx: &TransitionContext<'_>)
        -> Result<(), DelegateFailure>;
}

/// Executes suspend-to-disk.
pub trait HibernationEngine: Send + Sync {
    fn hibernate(&self, ctx: &TransitionContext<'_>) -> Result<(), DelegateFailure>;
}

/// Per-thread freezer accounting.
///
/// A thread that blocks on the suspend worker must not hold up task
/// freezing, so it steps out of the freezer's count while it waits.
pub trait Freezer: Send + Sync {
    /// Whether the calling thread is already excluded from freezing.
    fn should_skip(&self) -> bool;

    /// Exclude the calling thread from freezing.
    fn do_not_count(&self);

    /// Include the calling thread again.
    fn count(&self);
}

/// A freezer for hosts without task freezing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopFreezer;

impl Freezer for NoopFreezer {
    fn should_skip(&self) -> bool {
        true
    }

    fn do_not_count(&self) {}

    fn count(&self) {}
}

/// Scoped freezer opt-out. Restores the count on drop, on every path.
pub struct FreezerOptOut<'a> {
    freezer: &'a dyn Freezer,
    opted_out: bool,
}

impl<'a> FreezerOptOut<'a> {
    pub fn enter(freezer: &'a dyn Freezer) -> Self {
        let opted_out = !freezer.should_skip();
        if opted_out {
            freezer.do_not_count();
        }
        Self { freezer, opted_out }
    }
}

impl Drop for FreezerOptOut<'_> {
    fn drop(&mut self) {
        if self.opted_out {
            self.freezer.count();
        }
    }
}
