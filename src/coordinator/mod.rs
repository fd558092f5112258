//! Sleep-state coordinator
//!
//! One explicit object owns every piece of power-management state:
//! - the state registry and global sleep lock
//! - the wakeup-count guard
//! - autosleep target and wakelocks
//! - notifier chain, failure stats and metrics
//! - the async suspend worker
//!
//! The control surface (`crate::control`) and the HTTP server only ever talk
//! to a [`SleepCoordinator`].

mod lock;
mod transition;

pub use self::lock::{LockState, SleepLock, TransitionGuard};
pub use self::transition::TransitionCore;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use uuid::Uuid;

use crate::autosleep::{decode_autosleep, AutosleepOutcome, WakelockRequest};
use crate::config::PmConfig;
use crate::engine::{
    Freezer, FreezerOptOut, HibernationEngine, NoopFreezer, SimulatedPlatform, SuspendEngine,
};
use crate::errors::{PmError, PmResult};
use crate::notifier::NotifierChain;
use crate::observability::{
    log_event, log_event_with_fields, Event, Logger, MetricsRegistry, MetricsSnapshot,
};
use crate::state::{SleepState, StateRegistry, TestLevel};
use crate::stats::SuspendStatsSnapshot;
use crate::wakeup::{WakeupEvents, WakeupSource};
use crate::worker::SuspendWorker;

// =============================================================================
// Platform
// =============================================================================

/// The external collaborators a coordinator drives.
#[derive(Clone)]
pub struct Platform {
    pub suspend: Arc<dyn SuspendEngine>,
    pub hibernation: Option<Arc<dyn HibernationEngine>>,
    pub wakeup: Arc<dyn WakeupSource>,
    pub freezer: Arc<dyn Freezer>,
}

impl Platform {
    /// A platform without hibernation support and without a task freezer.
    pub fn new(suspend: Arc<dyn SuspendEngine>, wakeup: Arc<dyn WakeupSource>) -> Self {
        Self {
            suspend,
            hibernation: None,
            wakeup,
            freezer: Arc::new(NoopFreezer),
        }
    }

    pub fn with_hibernation(mut self, engine: Arc<dyn HibernationEngine>) -> Self {
        self.hibernation = Some(engine);
        self
    }

    pub fn with_freezer(mut self, freezer: Arc<dyn Freezer>) -> Self {
        self.freezer = freezer;
        self
    }

    /// In-process platform: the simulator runs both engines.
    pub fn simulated(engine: Arc<SimulatedPlatform>, wakeup: Arc<WakeupEvents>) -> Self {
        Self::new(engine.clone(), wakeup).with_hibernation(engine)
    }
}

/// Optional features present on this coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub autosleep: bool,
    pub wakelocks: bool,
    pub pm_debug: bool,
    pub pm_trace: bool,
    pub freezer: bool,
    pub hibernation: bool,
}

impl Capabilities {
    fn from_config(config: &PmConfig, registry: &StateRegistry) -> Self {
        Self {
            autosleep: config.autosleep,
            wakelocks: config.wakelocks,
            pm_debug: config.pm_debug,
            pm_trace: config.pm_trace,
            freezer: config.freezer,
            hibernation: registry.hibernation_available(),
        }
    }
}

// =============================================================================
// Coordinator
// =============================================================================

/// System-wide sleep-state coordinator.
pub struct SleepCoordinator {
    core: Arc<TransitionCore>,
    worker: Option<SuspendWorker>,
    freezer: Arc<dyn Freezer>,
    capabilities: Capabilities,
    fallback_logged: AtomicBool,
}

impl SleepCoordinator {
    /// Build a coordinator from validated configuration.
    ///
    /// Starts the async suspend worker when `async_suspend_worker` is set. A
    /// worker that cannot be started is not fatal: transitions then run on
    /// the caller's thread.
    pub fn new(config: &PmConfig, platform: Platform) -> PmResult<Self> {
        config
            .validate()
            .map_err(|e| PmError::Config(e.to_string()))?;
        Logger::set_min_severity(config.severity());
        log_event(Event::BootStart);

        let core = Arc::new(TransitionCore::new(
            config,
            platform.suspend,
            platform.hibernation,
            platform.wakeup,
        ));
        let worker = config
            .async_suspend_worker
            .then(|| SuspendWorker::spawn(Arc::clone(&core)));

        let coordinator = Self::assemble(config, core, worker, platform.freezer);
        let states = coordinator.show_states();
        log_event_with_fields(
            Event::BootComplete,
            &[
                ("async_worker", if coordinator.worker.is_some() { "true" } else { "false" }),
                ("states", states.trim_end()),
            ],
        );
        Ok(coordinator)
    }

    fn assemble(
        config: &PmConfig,
        core: Arc<TransitionCore>,
        worker: Option<PmResult<SuspendWorker>>,
        freezer: Arc<dyn Freezer>,
    ) -> Self {
        let capabilities = Capabilities::from_config(config, &core.registry);
        let mut coordinator = Self {
            core,
            worker: None,
            freezer,
            capabilities,
            fallback_logged: AtomicBool::new(false),
        };
        match worker {
            Some(Ok(worker)) => coordinator.worker = Some(worker),
            Some(Err(e)) => coordinator.log_fallback_once(&e.to_string()),
            None => {}
        }
        coordinator
    }

    fn log_fallback_once(&self, reason: &str) {
        if !self.fallback_logged.swap(true, Ordering::Relaxed) {
            log_event_with_fields(Event::SuspendWorkerUnavailable, &[("reason", reason)]);
        }
    }

    // -------------------------------------------------------------------------
    // state
    // -------------------------------------------------------------------------

    /// Handle a `state` write.
    ///
    /// Runs on the suspend worker when one is available, otherwise on the
    /// calling thread. Either way the result is that of the transition.
    /// A request the worker accepted is never run a second time here.
    pub fn request_transition(&self, input: &[u8]) -> PmResult<usize> {
        let request_id = Uuid::new_v4();
        if let Some(worker) = &self.worker {
            let _opt_out = FreezerOptOut::enter(self.freezer.as_ref());
            self.core.metrics.increment_async_submissions();
            match worker.submit(input, request_id) {
                Ok(result) => return result,
                Err(e) => self.log_fallback_once(&e.to_string()),
            }
        }
        self.core.metrics.increment_sync_fallbacks();
        self.core.enter_state(input, request_id)
    }

    /// Available state labels, space separated and newline terminated.
    pub fn show_states(&self) -> String {
        self.core.registry.show()
    }

    /// State currently being entered; `On` when idle.
    pub fn current_state(&self) -> SleepState {
        self.core.lock.current_state()
    }

    /// Whether a transition currently holds the sleep lock.
    pub fn transition_in_progress(&self) -> bool {
        self.core.lock.is_held()
    }

    pub fn registry(&self) -> &StateRegistry {
        &self.core.registry
    }

    // -------------------------------------------------------------------------
    // wakeup_count
    // -------------------------------------------------------------------------

    /// Read the wakeup counter, waiting for in-flight events to settle.
    pub fn read_wakeup_count(&self) -> PmResult<u64> {
        self.core.wakeup.snapshot(true).map_err(|e| {
            let active = self.core.wakeup.active_sources().join(",");
            log_event_with_fields(Event::WakeupCountInterrupted, &[("active_sources", &active)]);
            e
        })
    }

    /// Commit `candidate` as the wakeup-count baseline.
    ///
    /// Refused with `Busy` while autosleep is enabled. Fails with `RaceLost`
    /// if a wakeup event happened since `candidate` was read.
    pub fn save_wakeup_count(&self, candidate: u64) -> PmResult<()> {
        let state = self.core.lock.state();
        if state.autosleep.is_enabled() {
            return Err(PmError::Busy);
        }
        if self.core.wakeup.try_save(candidate) {
            drop(state);
            log_event_with_fields(
                Event::WakeupCountSaved,
                &[("count", &candidate.to_string())],
            );
            return Ok(());
        }
        drop(state);

        self.core.metrics.increment_wakeup_races_lost();
        let live = self.core.wakeup.live_count();
        let active_sources = self.core.wakeup.active_sources();
        log_event_with_fields(
            Event::WakeupCountRaceLost,
            &[
                ("active_sources", &active_sources.join(",")),
                ("candidate", &candidate.to_string()),
                ("live", &live.to_string()),
            ],
        );
        Err(PmError::RaceLost {
            candidate,
            live,
            active_sources,
        })
    }

    /// Committed wakeup-count baseline, if any.
    pub fn saved_wakeup_count(&self) -> Option<u64> {
        self.core.wakeup.saved()
    }

    // -------------------------------------------------------------------------
    // autosleep
    // -------------------------------------------------------------------------

    /// Set or clear the autosleep target.
    pub fn set_autosleep(&self, input: &[u8]) -> PmResult<SleepState> {
        let request = decode_autosleep(&self.core.registry, input)?;
        let target = self.core.lock.state().autosleep.set(request)?;
        log_event_with_fields(Event::AutosleepTargetSet, &[("target", &target.to_string())]);
        Ok(target)
    }

    pub fn show_autosleep(&self) -> String {
        let autosleep = self.core.lock.state().autosleep;
        autosleep.show(&self.core.registry)
    }

    /// One iteration of the autosleep policy loop.
    ///
    /// Wakelocks and wakeup events defer the attempt; otherwise the target
    /// is entered exactly as a `state` write would enter it, on the calling
    /// thread.
    pub fn autosleep_attempt(&self) -> PmResult<AutosleepOutcome> {
        self.core.metrics.increment_autosleep_attempts();
        if !self.core.lock.state().autosleep.is_enabled() {
            return Ok(AutosleepOutcome::Disabled);
        }

        let held = self.core.wakelocks.active();
        if !held.is_empty() {
            log_event_with_fields(
                Event::AutosleepDeferred,
                &[("reason", "wakelocks"), ("wakelocks", &held.join(","))],
            );
            return Ok(AutosleepOutcome::BlockedByWakelocks(held));
        }

        let count = match self.core.wakeup.snapshot(false) {
            Ok(count) => count,
            Err(_) => {
                log_event_with_fields(Event::AutosleepDeferred, &[("reason", "wakeup_in_progress")]);
                return Ok(AutosleepOutcome::WakeupPending);
            }
        };
        if !self.core.wakeup.try_save(count) {
            log_event_with_fields(Event::AutosleepDeferred, &[("reason", "wakeup_raced")]);
            return Ok(AutosleepOutcome::WakeupPending);
        }

        let guard = self.core.lock.acquire()?;
        let target = guard.autosleep_target();
        if !target.is_sleep() {
            return Ok(AutosleepOutcome::Disabled);
        }
        if !self.core.registry.is_available(target) {
            return Err(PmError::invalid(format!(
                "autosleep target '{}' is no longer available",
                target
            )));
        }
        self.core.dispatch(&guard, target, Uuid::new_v4())?;
        Ok(AutosleepOutcome::Entered(target))
    }

    // -------------------------------------------------------------------------
    // wakelocks
    // -------------------------------------------------------------------------

    pub fn acquire_wakelock(&self, input: &[u8]) -> PmResult<()> {
        let request = WakelockRequest::parse(input)?;
        self.core.wakelocks.acquire(&request);
        let timeout = request
            .timeout
            .map(|t| t.as_nanos().to_string())
            .unwrap_or_else(|| "none".to_string());
        log_event_with_fields(
            Event::WakelockAcquired,
            &[("name", &request.name), ("timeout_ns", &timeout)],
        );
        Ok(())
    }

    pub fn release_wakelock(&self, input: &[u8]) -> PmResult<()> {
        let request = WakelockRequest::parse(input)?;
        self.core.wakelocks.release(&request.name)?;
        log_event_with_fields(Event::WakelockReleased, &[("name", &request.name)]);
        Ok(())
    }

    /// Active wakelock names, sorted.
    pub fn active_wakelocks(&self) -> Vec<String> {
        self.core.wakelocks.active()
    }

    /// Released or expired wakelock names, sorted.
    pub fn inactive_wakelocks(&self) -> Vec<String> {
        self.core.wakelocks.inactive()
    }

    // -------------------------------------------------------------------------
    // debug knobs
    // -------------------------------------------------------------------------

    pub fn test_level(&self) -> TestLevel {
        self.core.lock.state().test_level
    }

    pub fn set_test_level(&self, level: TestLevel) {
        self.core.lock.state().test_level = level;
        log_event_with_fields(Event::PmTestLevelSet, &[("level", level.name())]);
    }

    pub fn pm_async(&self) -> bool {
        self.core.pm_async.load(Ordering::Relaxed)
    }

    pub fn set_pm_async(&self, enabled: bool) {
        self.core.pm_async.store(enabled, Ordering::Relaxed);
    }

    pub fn pm_trace(&self) -> bool {
        self.core.pm_trace.load(Ordering::Relaxed)
    }

    /// Device named by the last failure recorded while `pm_trace` was on.
    pub fn pm_trace_dev_match(&self) -> Option<String> {
        self.core.trace_match().clone()
    }

    pub fn set_pm_trace(&self, enabled: bool) {
        self.core.pm_trace.store(enabled, Ordering::Relaxed);
        if enabled {
            log_event(Event::PmTraceEnabled);
        }
    }

    pub fn freeze_timeout_ms(&self) -> u32 {
        self.core.freeze_timeout_ms.load(Ordering::Relaxed)
    }

    pub fn set_freeze_timeout_ms(&self, timeout_ms: u32) {
        self.core.freeze_timeout_ms.store(timeout_ms, Ordering::Relaxed);
    }

    // -------------------------------------------------------------------------
    // diagnostics
    // -------------------------------------------------------------------------

    pub fn notifiers(&self) -> &NotifierChain {
        &self.core.notifiers
    }

    /// `suspend_stats` text report.
    pub fn stats_report(&self) -> String {
        self.core.stats().render()
    }

    pub fn stats_snapshot(&self) -> SuspendStatsSnapshot {
        self.core.stats().snapshot()
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.core.metrics
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.core.metrics.snapshot()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Whether transitions run on the dedicated worker.
    pub fn uses_worker(&self) -> bool {
        self.worker.is_some()
    }
}

impl Drop for SleepCoordinator {
    fn drop(&mut self) {
        // Joins the worker thread before the shutdown line is written.
        self.worker.take();
        log_event(Event::Shutdown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{DelegateFailure, SuspendPhase, TransitionContext};
    use crate::notifier::{NotifierError, PmEvent};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    fn coordinator(config: &PmConfig) -> (Arc<SimulatedPlatform>, Arc<WakeupEvents>, SleepCoordinator) {
        let engine = Arc::new(SimulatedPlatform::new());
        let wakeup = Arc::new(WakeupEvents::new());
        let platform = Platform::simulated(engine.clone(), wakeup.clone());
        let coordinator = SleepCoordinator::new(config, platform).unwrap();
        (engine, wakeup, coordinator)
    }

    #[test]
    fn test_transition_through_worker() {
        let (engine, _, coordinator) = coordinator(&PmConfig::default());
        assert!(coordinator.uses_worker());
        assert_eq!(coordinator.request_transition(b"mem\n"), Ok(4));
        assert_eq!(engine.history().len(), 1);
        assert_eq!(coordinator.metrics_snapshot().async_submissions, 1);
        assert_eq!(coordinator.current_state(), SleepState::On);
    }

    #[test]
    fn test_transition_without_worker() {
        let config = PmConfig {
            async_suspend_worker: false,
            ..PmConfig::default()
        };
        let (engine, _, coordinator) = coordinator(&config);
        assert!(!coordinator.uses_worker());
        assert_eq!(coordinator.request_transition(b"freeze"), Ok(6));
        assert_eq!(engine.history()[0].state, SleepState::Freeze);
        assert_eq!(coordinator.metrics_snapshot().sync_fallbacks, 1);
    }

    #[test]
    fn test_worker_spawn_failure_falls_back() {
        let config = PmConfig::default();
        let engine = Arc::new(SimulatedPlatform::new());
        let core = Arc::new(TransitionCore::new(
            &config,
            engine.clone(),
            None,
            Arc::new(WakeupEvents::new()),
        ));
        let coordinator = SleepCoordinator::assemble(
            &config,
            core,
            Some(Err(PmError::ResourceExhaustion("no threads".to_string()))),
            Arc::new(NoopFreezer),
        );

        assert!(!coordinator.uses_worker());
        assert!(coordinator.fallback_logged.load(Ordering::Relaxed));
        assert_eq!(coordinator.request_transition(b"standby"), Ok(7));
        assert_eq!(engine.history().len(), 1);
    }

    /// Panics on its first suspend, then succeeds.
    struct PanicOnceEngine {
        calls: AtomicUsize,
    }

    impl SuspendEngine for PanicOnceEngine {
        fn suspend(
            &self,
            _state: SleepState,
            _ctx: &TransitionContext<'_>,
        ) -> Result<(), DelegateFailure> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("engine fault");
            }
            Ok(())
        }
    }

    #[test]
    fn test_worker_death_does_not_rerun_request() {
        let engine = Arc::new(PanicOnceEngine {
            calls: AtomicUsize::new(0),
        });
        let platform = Platform::new(engine.clone(), Arc::new(WakeupEvents::new()));
        let coordinator = SleepCoordinator::new(&PmConfig::default(), platform).unwrap();
        assert!(coordinator.uses_worker());

        let result = coordinator.request_transition(b"mem\n");
        assert!(matches!(result, Err(PmError::ResourceExhaustion(_))));
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.metrics_snapshot().sync_fallbacks, 0);
        assert_eq!(coordinator.current_state(), SleepState::On);

        // The worker is gone, so the next request never reaches it and
        // runs on the caller's thread.
        assert_eq!(coordinator.request_transition(b"mem\n"), Ok(4));
        assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
        assert_eq!(coordinator.metrics_snapshot().sync_fallbacks, 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = PmConfig {
            failure_record_depth: 0,
            ..PmConfig::default()
        };
        let engine = Arc::new(SimulatedPlatform::new());
        let platform = Platform::simulated(engine, Arc::new(WakeupEvents::new()));
        assert!(matches!(
            SleepCoordinator::new(&config, platform),
            Err(PmError::Config(_))
        ));
    }

    #[test]
    fn test_wakeup_count_handshake() {
        let (_, wakeup, coordinator) = coordinator(&PmConfig::default());
        wakeup.report_event("rtc");
        let count = coordinator.read_wakeup_count().unwrap();
        assert_eq!(coordinator.save_wakeup_count(count), Ok(()));
        assert_eq!(coordinator.saved_wakeup_count(), Some(count));

        wakeup.report_event("rtc");
        let err = coordinator.save_wakeup_count(count).unwrap_err();
        assert!(matches!(err, PmError::RaceLost { live: 2, .. }));
        assert_eq!(coordinator.saved_wakeup_count(), Some(count));
    }

    #[test]
    fn test_wakeup_count_busy_under_autosleep() {
        let (_, _, coordinator) = coordinator(&PmConfig::default());
        coordinator.set_autosleep(b"mem").unwrap();
        assert_eq!(coordinator.save_wakeup_count(0), Err(PmError::Busy));
    }

    #[test]
    fn test_autosleep_attempt_outcomes() {
        let (engine, wakeup, coordinator) = coordinator(&PmConfig::default());
        assert_eq!(coordinator.autosleep_attempt(), Ok(AutosleepOutcome::Disabled));

        coordinator.set_autosleep(b"standby\n").unwrap();
        coordinator.acquire_wakelock(b"radio").unwrap();
        assert_eq!(
            coordinator.autosleep_attempt(),
            Ok(AutosleepOutcome::BlockedByWakelocks(vec!["radio".to_string()]))
        );

        coordinator.release_wakelock(b"radio").unwrap();
        wakeup.stay_awake("usb");
        assert_eq!(coordinator.autosleep_attempt(), Ok(AutosleepOutcome::WakeupPending));

        wakeup.relax("usb");
        assert_eq!(
            coordinator.autosleep_attempt(),
            Ok(AutosleepOutcome::Entered(SleepState::Standby))
        );
        assert_eq!(engine.history()[0].state, SleepState::Standby);
        assert_eq!(coordinator.stats_snapshot().success, 1);
    }

    #[test]
    fn test_autosleep_attempt_reports_delegate_failure() {
        let (engine, _, coordinator) = coordinator(&PmConfig::default());
        coordinator.set_autosleep(b"mem").unwrap();
        engine.fail_next(DelegateFailure::new(-5, SuspendPhase::Suspend));
        let err = coordinator.autosleep_attempt().unwrap_err();
        assert_eq!(err.errno(), -5);
        assert_eq!(coordinator.stats_snapshot().fail, 1);
    }

    #[test]
    fn test_notifier_sees_prepare_and_post() {
        let (_, _, coordinator) = coordinator(&PmConfig::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        coordinator.notifiers().register(Arc::new(
            move |event: PmEvent| -> Result<(), NotifierError> {
                sink.lock().unwrap().push(event);
                Ok(())
            },
        ));

        coordinator.request_transition(b"mem").unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![PmEvent::SuspendPrepare, PmEvent::PostSuspend]
        );
    }

    #[test]
    fn test_debug_knobs() {
        let (engine, _, coordinator) = coordinator(&PmConfig::default());
        coordinator.set_test_level(TestLevel::Devices);
        coordinator.set_pm_async(false);
        coordinator.set_pm_trace(true);
        coordinator.set_freeze_timeout_ms(500);

        coordinator.request_transition(b"mem").unwrap();
        let entry = &engine.history()[0];
        assert_eq!(entry.test_level, TestLevel::Devices);
        assert!(!entry.async_devices);
        assert!(coordinator.pm_trace());
        assert_eq!(coordinator.freeze_timeout_ms(), 500);
    }

    #[test]
    fn test_trace_match_records_failing_device() {
        let config = PmConfig {
            pm_trace: true,
            ..PmConfig::default()
        };
        let (engine, _, coordinator) = coordinator(&config);

        engine.fail_next(DelegateFailure::new(-16, SuspendPhase::Suspend).with_device("mmc0"));
        assert!(coordinator.request_transition(b"mem").is_err());
        assert_eq!(coordinator.pm_trace_dev_match(), None);

        coordinator.set_pm_trace(true);
        engine.fail_next(DelegateFailure::new(-5, SuspendPhase::Resume).with_device("usb1"));
        assert!(coordinator.request_transition(b"mem").is_err());
        assert_eq!(coordinator.pm_trace_dev_match().as_deref(), Some("usb1"));

        coordinator.request_transition(b"mem").unwrap();
        assert_eq!(coordinator.pm_trace_dev_match().as_deref(), Some("usb1"));
    }
}
