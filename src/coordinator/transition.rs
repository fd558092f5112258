//! Lock, decode, dispatch, record
//!
//! `TransitionCore` owns every piece of state a transition touches and is
//! shared between the caller-facing coordinator and the suspend worker
//! thread. `enter_state` is the complete sequence for one `state` write;
//! whichever thread runs it holds the global sleep lock from decode to
//! result recording.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use uuid::Uuid;

use crate::autosleep::WakelockRegistry;
use crate::config::PmConfig;
use crate::engine::{HibernationEngine, SuspendEngine, TransitionContext};
use crate::errors::{PmError, PmResult};
use crate::notifier::NotifierChain;
use crate::observability::{log_event_with_fields, Event, MetricsRegistry, ObservationScope};
use crate::state::{trim_request, Decoded, SleepState, StateRegistry};
use crate::stats::SuspendStats;
use crate::wakeup::{WakeupCountGuard, WakeupSource};

use super::lock::{SleepLock, TransitionGuard};

/// Shared coordinator state.
pub struct TransitionCore {
    pub(super) registry: StateRegistry,
    pub(super) lock: SleepLock,
    pub(super) wakeup: WakeupCountGuard,
    pub(super) notifiers: NotifierChain,
    pub(super) wakelocks: WakelockRegistry,
    pub(super) stats: Mutex<SuspendStats>,
    pub(super) metrics: MetricsRegistry,
    suspend: Arc<dyn SuspendEngine>,
    hibernation: Option<Arc<dyn HibernationEngine>>,
    pub(super) pm_async: AtomicBool,
    pub(super) pm_trace: AtomicBool,
    /// Device blamed by the last traced failure.
    trace_match: Mutex<Option<String>>,
    pub(super) freeze_timeout_ms: AtomicU32,
}

impl TransitionCore {
    pub(super) fn new(
        config: &PmConfig,
        suspend: Arc<dyn SuspendEngine>,
        hibernation: Option<Arc<dyn HibernationEngine>>,
        wakeup: Arc<dyn WakeupSource>,
    ) -> Self {
        let hibernation = hibernation.filter(|_| config.hibernation);
        Self {
            registry: config.state_registry(hibernation.is_some()),
            lock: SleepLock::new(),
            wakeup: WakeupCountGuard::new(wakeup),
            notifiers: NotifierChain::new(),
            wakelocks: WakelockRegistry::new(),
            stats: Mutex::new(SuspendStats::new(config.failure_record_depth)),
            metrics: MetricsRegistry::new(),
            suspend,
            hibernation,
            pm_async: AtomicBool::new(config.pm_async),
            pm_trace: AtomicBool::new(false),
            trace_match: Mutex::new(None),
            freeze_timeout_ms: AtomicU32::new(config.freeze_timeout_ms),
        }
    }

    pub(super) fn stats(&self) -> MutexGuard<'_, SuspendStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn trace_match(&self) -> MutexGuard<'_, Option<String>> {
        self.trace_match.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Handle one `state` write: claim the lock, decode, dispatch, record.
    ///
    /// Returns the number of bytes consumed.
    pub fn enter_state(&self, input: &[u8], request_id: Uuid) -> PmResult<usize> {
        self.metrics.increment_transitions_requested();
        let request_text = String::from_utf8_lossy(trim_request(input)).into_owned();
        let request_id_text = request_id.to_string();

        let guard = match self.lock.acquire() {
            Ok(guard) => guard,
            Err(e) => {
                self.metrics.increment_busy_rejections();
                log_event_with_fields(
                    Event::TransitionBusy,
                    &[("request", &request_text), ("request_id", &request_id_text)],
                );
                return Err(e);
            }
        };

        if guard.autosleep_target().is_sleep() {
            self.metrics.increment_busy_rejections();
            log_event_with_fields(
                Event::TransitionBusy,
                &[
                    ("autosleep", &guard.autosleep_target().to_string()),
                    ("request", &request_text),
                    ("request_id", &request_id_text),
                ],
            );
            return Err(PmError::Busy);
        }

        let state = match self.registry.decode(input) {
            Decoded::Sleep(state) => state,
            Decoded::ExplicitOn | Decoded::ParseFailure => {
                self.metrics.increment_invalid_requests();
                log_event_with_fields(
                    Event::TransitionInvalid,
                    &[("request", &request_text), ("request_id", &request_id_text)],
                );
                return Err(PmError::invalid(format!(
                    "'{}' is not an available sleep state",
                    request_text
                )));
            }
        };

        self.dispatch(&guard, state, request_id)?;
        Ok(input.len())
    }

    /// Run `state` on its engine and record the outcome.
    ///
    /// The caller holds `guard`; the coordinator reports `state` as current
    /// until the guard is dropped.
    pub(super) fn dispatch(
        &self,
        guard: &TransitionGuard<'_>,
        state: SleepState,
        request_id: Uuid,
    ) -> PmResult<()> {
        guard.enter(state);
        let scope = ObservationScope::with_fields(
            "SLEEP_TRANSITION",
            vec![
                ("request_id", request_id.to_string()),
                ("state", state.to_string()),
                ("test_level", guard.test_level().to_string()),
            ],
        );

        let ctx = TransitionContext {
            request_id,
            notifiers: &self.notifiers,
            wakeup: &self.wakeup,
            test_level: guard.test_level(),
            async_devices: self.pm_async.load(Ordering::Relaxed),
            freeze_timeout: Duration::from_millis(u64::from(
                self.freeze_timeout_ms.load(Ordering::Relaxed),
            )),
            trace: self.pm_trace.load(Ordering::Relaxed),
        };

        let result = match (state, &self.hibernation) {
            (SleepState::Hibernate, Some(engine)) => engine.hibernate(&ctx),
            (SleepState::Hibernate, None) | (SleepState::On, _) => {
                scope.fail("state has no engine");
                return Err(PmError::invalid(format!("'{}' cannot be entered", state)));
            }
            (suspend_state, _) => self.suspend.suspend(suspend_state, &ctx),
        };

        match result {
            Ok(()) => {
                self.stats().record_success();
                self.metrics.increment_transitions_succeeded();
                scope.complete();
                Ok(())
            }
            Err(failure) => {
                self.stats().record_failure(&failure);
                if ctx.trace {
                    if let Some(device) = &failure.device {
                        *self.trace_match() = Some(device.clone());
                    }
                }
                self.metrics.increment_transitions_failed();
                let reason = format!(
                    "code {} during {} (device: {})",
                    failure.code,
                    failure.phase,
                    failure.device.as_deref().unwrap_or("none")
                );
                scope.fail(&reason);
                Err(PmError::Delegate(failure))
            }
        }
    }
}
