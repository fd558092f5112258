//! Wakeup-count handshake
//!
//! User space reads the counter, finishes its own work, then writes the
//! value back. The write commits only if no wakeup event happened in
//! between. A committed baseline lets the engine notice an event that
//! arrives later and abort the transition on its own.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::errors::{PmError, PmResult};

use super::events::WakeupSource;

/// Holds the last committed wakeup-count baseline.
pub struct WakeupCountGuard {
    source: Arc<dyn WakeupSource>,
    saved: Mutex<Option<u64>>,
}

impl WakeupCountGuard {
    pub fn new(source: Arc<dyn WakeupSource>) -> Self {
        Self {
            source,
            saved: Mutex::new(None),
        }
    }

    fn saved_slot(&self) -> MutexGuard<'_, Option<u64>> {
        self.saved.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read the counter.
    ///
    /// With `block`, waits for in-flight events to finish first. Fails with
    /// `Interrupted` if that wait is interrupted or if events are still in
    /// progress when the counter is read.
    pub fn snapshot(&self, block: bool) -> PmResult<u64> {
        if block && !self.source.wait_until_settled() {
            return Err(PmError::Interrupted);
        }
        let counts = self.source.counts();
        if counts.in_progress > 0 {
            return Err(PmError::Interrupted);
        }
        Ok(counts.registered)
    }

    /// Commit `candidate` as the baseline if nothing happened since it was
    /// read. On failure the previous baseline is left untouched.
    pub fn try_save(&self, candidate: u64) -> bool {
        let mut saved = self.saved_slot();
        if self.source.counts().matches(candidate) {
            *saved = Some(candidate);
            true
        } else {
            false
        }
    }

    /// True if a wakeup event arrived after the committed baseline.
    ///
    /// A positive answer disarms the baseline; the next transition needs a
    /// fresh handshake to be checked again.
    pub fn wakeup_pending(&self) -> bool {
        let mut saved = self.saved_slot();
        match *saved {
            Some(baseline) => {
                let pending = !self.source.counts().matches(baseline);
                if pending {
                    *saved = None;
                }
                pending
            }
            None => false,
        }
    }

    /// The committed baseline, if any.
    pub fn saved(&self) -> Option<u64> {
        *self.saved_slot()
    }

    /// Live counter value, without waiting.
    pub fn live_count(&self) -> u64 {
        self.source.registered_events()
    }

    /// Sources currently holding a wakeup event open.
    pub fn active_sources(&self) -> Vec<String> {
        self.source.active_sources()
    }
}
