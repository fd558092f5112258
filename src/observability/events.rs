//! Lifecycle events emitted by the coordinator
//!
//! Events are explicit and typed; the string form is what lands in the
//! `event` key of every log line.

use std::fmt;

/// Observable events
///
/// Grouped by the component that emits them:
/// - boot and shutdown of the coordinator
/// - sleep transitions
/// - wakeup-count handshake
/// - async suspend worker
/// - autosleep and wakelocks
/// - control surface and debug knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    /// Coordinator construction begins
    BootStart,
    /// Coordinator constructed, control surface ready
    BootComplete,
    /// Configuration file parsed and validated
    ConfigLoaded,
    /// Coordinator torn down
    Shutdown,
    /// HTTP control surface listening
    Serving,

    // Transitions
    /// A state write was rejected because a transition is in flight
    TransitionBusy,
    /// A state write did not name an available sleep state
    TransitionInvalid,

    // Wakeup count
    /// A wakeup count baseline was committed
    WakeupCountSaved,
    /// A wakeup event raced the committed baseline
    WakeupCountRaceLost,
    /// Waiting for in-flight wakeup events was interrupted
    WakeupCountInterrupted,

    // Worker
    /// The async suspend worker thread started
    SuspendWorkerStarted,
    /// The async suspend worker could not be started or has gone away
    SuspendWorkerUnavailable,
    /// The async suspend worker thread exited
    SuspendWorkerStopped,

    // Autosleep
    /// Autosleep target changed
    AutosleepTargetSet,
    /// Autosleep attempt deferred
    AutosleepDeferred,
    /// Wakelock acquired
    WakelockAcquired,
    /// Wakelock released
    WakelockReleased,

    // Debug knobs
    /// pm_test level changed
    PmTestLevelSet,
    /// pm_trace enabled; the RTC will be clobbered on the next transition
    PmTraceEnabled,
    /// A notifier subscriber vetoed an event
    NotifierVeto,
}

impl Event {
    /// Returns the string representation of this event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::BootStart => "PMCORE_BOOT_BEGIN",
            Event::BootComplete => "PMCORE_BOOT_COMPLETE",
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::Shutdown => "PMCORE_SHUTDOWN",
            Event::Serving => "PMCORE_SERVING",

            Event::TransitionBusy => "SLEEP_TRANSITION_BUSY",
            Event::TransitionInvalid => "SLEEP_TRANSITION_INVALID",

            Event::WakeupCountSaved => "WAKEUP_COUNT_SAVED",
            Event::WakeupCountRaceLost => "WAKEUP_COUNT_RACE_LOST",
            Event::WakeupCountInterrupted => "WAKEUP_COUNT_INTERRUPTED",

            Event::SuspendWorkerStarted => "SUSPEND_WORKER_STARTED",
            Event::SuspendWorkerUnavailable => "SUSPEND_WORKER_UNAVAILABLE",
            Event::SuspendWorkerStopped => "SUSPEND_WORKER_STOPPED",

            Event::AutosleepTargetSet => "AUTOSLEEP_TARGET_SET",
            Event::AutosleepDeferred => "AUTOSLEEP_DEFERRED",
            Event::WakelockAcquired => "WAKELOCK_ACQUIRED",
            Event::WakelockReleased => "WAKELOCK_RELEASED",

            Event::PmTestLevelSet => "PM_TEST_LEVEL_SET",
            Event::PmTraceEnabled => "PM_TRACE_ENABLED",
            Event::NotifierVeto => "NOTIFIER_VETO",
        }
    }

    /// Severity the event is logged at when emitted through
    /// [`super::log_event`].
    pub fn severity(&self) -> super::Severity {
        use super::Severity;
        match self {
            Event::TransitionBusy
            | Event::TransitionInvalid
            | Event::WakeupCountRaceLost
            | Event::WakeupCountInterrupted
            | Event::SuspendWorkerUnavailable
            | Event::PmTraceEnabled
            | Event::NotifierVeto => Severity::Warn,
            Event::AutosleepDeferred | Event::WakeupCountSaved => Severity::Trace,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::Severity;

    const ALL: [Event; 20] = [
        Event::BootStart,
        Event::BootComplete,
        Event::ConfigLoaded,
        Event::Shutdown,
        Event::Serving,
        Event::TransitionBusy,
        Event::TransitionInvalid,
        Event::WakeupCountSaved,
        Event::WakeupCountRaceLost,
        Event::WakeupCountInterrupted,
        Event::SuspendWorkerStarted,
        Event::SuspendWorkerUnavailable,
        Event::SuspendWorkerStopped,
        Event::AutosleepTargetSet,
        Event::AutosleepDeferred,
        Event::WakelockAcquired,
        Event::WakelockReleased,
        Event::PmTestLevelSet,
        Event::PmTraceEnabled,
        Event::NotifierVeto,
    ];

    #[test]
    fn test_event_names_are_upper_snake() {
        for event in ALL {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_ascii_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_event_names_are_unique() {
        let mut names: Vec<&str> = ALL.iter().map(|e| e.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ALL.len());
    }

    #[test]
    fn test_rejections_log_as_warnings() {
        assert_eq!(Event::WakeupCountRaceLost.severity(), Severity::Warn);
        assert_eq!(Event::TransitionBusy.severity(), Severity::Warn);
        assert_eq!(Event::BootComplete.severity(), Severity::Info);
    }

    #[test]
    fn test_event_display() {
        assert_eq!(format!("{}", Event::WakeupCountRaceLost), "WAKEUP_COUNT_RACE_LOST");
    }
}
