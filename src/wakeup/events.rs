//! Wakeup-event accounting
//!
//! The counter itself belongs to whoever reports wakeup events (drivers,
//! timers, input). The coordinator only reads it through [`WakeupSource`].
//! [`WakeupEvents`] is the in-process implementation used by the CLI, the
//! HTTP surface and the tests.

use std::collections::BTreeMap;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Both halves of the wakeup counter, read together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WakeupCounts {
    /// Monotonic count of wakeup events that have completed.
    pub registered: u64,
    /// Wakeup events currently being processed.
    pub in_progress: u64,
}

impl WakeupCounts {
    /// True if the counter still reads `baseline` with nothing in flight.
    pub fn matches(&self, baseline: u64) -> bool {
        self.registered == baseline && self.in_progress == 0
    }
}

/// Read-only view of the system wakeup counter.
pub trait WakeupSource: Send + Sync {
    /// Registered and in-progress counts as one consistent snapshot.
    ///
    /// Implementations must read both values atomically with respect to
    /// event completion.
    fn counts(&self) -> WakeupCounts;

    /// Monotonic count of wakeup events that have completed.
    fn registered_events(&self) -> u64 {
        self.counts().registered
    }

    /// Block until no event is in progress.
    ///
    /// Returns false if the wait was interrupted before that happened.
    fn wait_until_settled(&self) -> bool;

    /// Names of the sources holding an event open, for diagnostics.
    fn active_sources(&self) -> Vec<String>;
}

#[derive(Debug, Default)]
struct Counters {
    registered: u64,
    per_source: BTreeMap<String, u64>,
    in_progress: BTreeMap<String, u64>,
    interrupt_pending: bool,
}

impl Counters {
    fn total_in_progress(&self) -> u64 {
        self.in_progress.values().sum()
    }
}

/// In-memory wakeup counter.
#[derive(Debug, Default)]
pub struct WakeupEvents {
    counters: Mutex<Counters>,
    settled: Condvar,
}

impl WakeupEvents {
    pub fn new() -> Self {
        Self::default()
    }

    fn counters(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Report an instantaneous wakeup event from `source`.
    pub fn report_event(&self, source: &str) {
        let mut counters = self.counters();
        counters.registered += 1;
        *counters.per_source.entry(source.to_string()).or_insert(0) += 1;
    }

    /// Completed events reported by `source`.
    pub fn event_count(&self, source: &str) -> u64 {
        self.counters().per_source.get(source).copied().unwrap_or(0)
    }

    /// `source` starts processing a wakeup event.
    pub fn stay_awake(&self, source: &str) {
        *self.counters().in_progress.entry(source.to_string()).or_insert(0) += 1;
    }

    /// `source` finished processing; the event is now counted.
    ///
    /// Returns false if `source` had no event open.
    pub fn relax(&self, source: &str) -> bool {
        let mut counters = self.counters();
        let remaining = match counters.in_progress.get_mut(source) {
            Some(open) => {
                *open -= 1;
                *open
            }
            None => return false,
        };
        if remaining == 0 {
            counters.in_progress.remove(source);
        }
        counters.registered += 1;
        *counters.per_source.entry(source.to_string()).or_insert(0) += 1;
        let settled = counters.total_in_progress() == 0;
        drop(counters);
        if settled {
            self.settled.notify_all();
        }
        true
    }

    /// Wake one pending [`WakeupSource::wait_until_settled`] with a failure,
    /// the way a signal would. If nobody is waiting, the next wait fails.
    pub fn interrupt(&self) {
        self.counters().interrupt_pending = true;
        self.settled.notify_all();
    }
}

impl WakeupSource for WakeupEvents {
    fn counts(&self) -> WakeupCounts {
        let counters = self.counters();
        WakeupCounts {
            registered: counters.registered,
            in_progress: counters.total_in_progress(),
        }
    }

    fn wait_until_settled(&self) -> bool {
        let mut counters = self.counters();
        loop {
            if counters.interrupt_pending {
                counters.interrupt_pending = false;
                return false;
            }
            if counters.total_in_progress() == 0 {
                return true;
            }
            counters = self
                .settled
                .wait(counters)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn active_sources(&self) -> Vec<String> {
        self.counters().in_progress.keys().cloned().collect()
    }
}
