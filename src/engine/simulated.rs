//! In-process platform that "sleeps" by waiting
//!
//! Runs the notifier protocol, honours `pm_test`, aborts when a wakeup
//! event raced the committed baseline, and otherwise waits for the
//! configured latency. Failures can be scripted and the engine can be
//! paused at entry, which the concurrency tests rely on.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::errors::errno;
use crate::notifier::PmEvent;
use crate::state::{SleepState, TestLevel};

use super::{
    DelegateFailure, HibernationEngine, SuspendEngine, SuspendPhase, TransitionContext,
};

/// One call into the simulated engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedEntry {
    pub state: SleepState,
    pub request_id: Uuid,
    pub test_level: TestLevel,
    pub async_devices: bool,
}

#[derive(Debug, Default)]
struct Gate {
    paused: bool,
    entered: usize,
}

/// Simulated suspend and hibernation engine.
#[derive(Debug, Default)]
pub struct SimulatedPlatform {
    latency: Duration,
    script: Mutex<VecDeque<DelegateFailure>>,
    history: Mutex<Vec<SimulatedEntry>>,
    gate: Mutex<Gate>,
    gate_changed: Condvar,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SimulatedPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each successful transition takes `latency`.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    /// The next transition to reach the engine fails with `failure`.
    /// Queued failures are consumed in entry order.
    pub fn fail_next(&self, failure: DelegateFailure) {
        lock(&self.script).push_back(failure);
    }

    /// Hold every transition at engine entry until [`resume`](Self::resume).
    pub fn pause(&self) {
        lock(&self.gate).paused = true;
    }

    pub fn resume(&self) {
        lock(&self.gate).paused = false;
        self.gate_changed.notify_all();
    }

    /// Wait until `count` transitions have entered the engine in total.
    /// Returns false on timeout.
    pub fn wait_for_entries(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut gate = lock(&self.gate);
        while gate.entered < count {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            gate = self
                .gate_changed
                .wait_timeout(gate, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    /// Transitions seen so far, in entry order.
    pub fn history(&self) -> Vec<SimulatedEntry> {
        lock(&self.history).clone()
    }

    /// Largest number of transitions that were inside the engine at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn run(
        &self,
        state: SleepState,
        ctx: &TransitionContext<'_>,
        prepare: PmEvent,
        post: PmEvent,
    ) -> Result<(), DelegateFailure> {
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        lock(&self.history).push(SimulatedEntry {
            state,
            request_id: ctx.request_id,
            test_level: ctx.test_level,
            async_devices: ctx.async_devices,
        });
        self.enter_gate();

        let result = ctx.notify(prepare).and_then(|()| self.sleep(ctx));
        // Subscribers always hear the post event, even after a veto.
        let _ = ctx.notifiers.notify(post);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn enter_gate(&self) {
        let mut gate = lock(&self.gate);
        gate.entered += 1;
        self.gate_changed.notify_all();
        while gate.paused {
            gate = self
                .gate_changed
                .wait(gate)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn sleep(&self, ctx: &TransitionContext<'_>) -> Result<(), DelegateFailure> {
        if ctx.wakeup.wakeup_pending() {
            return Err(DelegateFailure::new(-errno::EBUSY, SuspendPhase::Suspend));
        }
        if let Some(failure) = lock(&self.script).pop_front() {
            return Err(failure);
        }
        if ctx.test_level != TestLevel::None {
            return Ok(());
        }
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
        Ok(())
    }
}

impl SuspendEngine for SimulatedPlatform {
    fn suspend(
        &self,
        state: SleepState,
        ctx: &TransitionContext<'_>,
    ) -> Result<(), DelegateFailure> {
        self.run(state, ctx, PmEvent::SuspendPrepare, PmEvent::PostSuspend)
    }
}

impl HibernationEngine for SimulatedPlatform {
    fn hibernate(&self, ctx: &TransitionContext<'_>) -> Result<(), DelegateFailure> {
        self.run(
            SleepState::Hibernate,
            ctx,
            PmEvent::HibernationPrepare,
            PmEvent::PostHibernation,
        )
    }
}
