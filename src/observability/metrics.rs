//! Metrics registry for the coordinator
//!
//! - Counters only, monotonic, reset on process start
//! - Relaxed atomics; readers get a best-effort snapshot

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters
///
/// The failure counters kept for the `suspend_stats` report live in
/// [`crate::stats::SuspendStats`]; this registry counts requests as they
/// arrive at the coordinator, including the ones rejected before dispatch.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    transitions_requested: AtomicU64,
    transitions_succeeded: AtomicU64,
    transitions_failed: AtomicU64,
    busy_rejections: AtomicU64,
    invalid_requests: AtomicU64,
    wakeup_races_lost: AtomicU64,
    async_submissions: AtomicU64,
    sync_fallbacks: AtomicU64,
    autosleep_attempts: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== Transitions ====================

    /// A transition request reached the coordinator
    pub fn increment_transitions_requested(&self) {
        self.transitions_requested.fetch_add(1, Ordering::Relaxed);
    }

    /// A dispatched transition returned success
    pub fn increment_transitions_succeeded(&self) {
        self.transitions_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    /// A dispatched transition returned a delegate failure
    pub fn increment_transitions_failed(&self) {
        self.transitions_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// A request found the coordinator busy
    pub fn increment_busy_rejections(&self) {
        self.busy_rejections.fetch_add(1, Ordering::Relaxed);
    }

    /// A request did not decode to an available state
    pub fn increment_invalid_requests(&self) {
        self.invalid_requests.fetch_add(1, Ordering::Relaxed);
    }

    // ==================== Handshake / worker ====================

    /// A wakeup_count write lost the race against a wakeup event
    pub fn increment_wakeup_races_lost(&self) {
        self.wakeup_races_lost.fetch_add(1, Ordering::Relaxed);
    }

    /// A request went through the async suspend worker
    pub fn increment_async_submissions(&self) {
        self.async_submissions.fetch_add(1, Ordering::Relaxed);
    }

    /// A request fell back to the synchronous path
    pub fn increment_sync_fallbacks(&self) {
        self.sync_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    /// The autosleep loop asked for one attempt
    pub fn increment_autosleep_attempts(&self) {
        self.autosleep_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            transitions_requested: self.transitions_requested.load(Ordering::Relaxed),
            transitions_succeeded: self.transitions_succeeded.load(Ordering::Relaxed),
            transitions_failed: self.transitions_failed.load(Ordering::Relaxed),
            busy_rejections: self.busy_rejections.load(Ordering::Relaxed),
            invalid_requests: self.invalid_requests.load(Ordering::Relaxed),
            wakeup_races_lost: self.wakeup_races_lost.load(Ordering::Relaxed),
            async_submissions: self.async_submissions.load(Ordering::Relaxed),
            sync_fallbacks: self.sync_fallbacks.load(Ordering::Relaxed),
            autosleep_attempts: self.autosleep_attempts.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub transitions_requested: u64,
    pub transitions_succeeded: u64,
    pub transitions_failed: u64,
    pub busy_rejections: u64,
    pub invalid_requests: u64,
    pub wakeup_races_lost: u64,
    pub async_submissions: u64,
    pub sync_fallbacks: u64,
    pub autosleep_attempts: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registry_has_zero_values() {
        let snapshot = MetricsRegistry::new().snapshot();
        assert_eq!(snapshot.transitions_requested, 0);
        assert_eq!(snapshot.busy_rejections, 0);
        assert_eq!(snapshot.async_submissions, 0);
    }

    #[test]
    fn test_increment_counters() {
        let registry = MetricsRegistry::new();

        registry.increment_transitions_requested();
        registry.increment_transitions_requested();
        registry.increment_transitions_succeeded();
        registry.increment_transitions_failed();
        registry.increment_busy_rejections();
        registry.increment_invalid_requests();
        registry.increment_wakeup_races_lost();
        registry.increment_async_submissions();
        registry.increment_sync_fallbacks();
        registry.increment_autosleep_attempts();

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.transitions_requested, 2);
        assert_eq!(snapshot.transitions_succeeded, 1);
        assert_eq!(snapshot.transitions_failed, 1);
        assert_eq!(snapshot.busy_rejections, 1);
        assert_eq!(snapshot.invalid_requests, 1);
        assert_eq!(snapshot.wakeup_races_lost, 1);
        assert_eq!(snapshot.async_submissions, 1);
        assert_eq!(snapshot.sync_fallbacks, 1);
        assert_eq!(snapshot.autosleep_attempts, 1);
    }

    #[test]
    fn test_snapshot_serializes() {
        let registry = MetricsRegistry::new();
        registry.increment_busy_rejections();

        let parsed = serde_json::to_value(registry.snapshot()).unwrap();
        assert_eq!(parsed["busy_rejections"], 1);
        assert_eq!(parsed["transitions_requested"], 0);
    }

    #[test]
    fn test_thread_safety() {
        use std::sync::Arc;
        use std::thread;

        let registry = Arc::new(MetricsRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let reg = Arc::clone(&registry);
                thread::spawn(move || {
                    for _ in 0..100 {
                        reg.increment_transitions_requested();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.snapshot().transitions_requested, 800);
    }
}
