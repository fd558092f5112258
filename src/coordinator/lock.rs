//! Global sleep lock
//!
//! One mutex guards the coordinator's bookkeeping: the `held` flag, the
//! state being entered, the autosleep target and the `pm_test` level. The
//! mutex is never held across a transition. Instead `held` stays set for
//! the whole transition, so a second request sees a non-idle coordinator
//! and fails with `Busy` instead of queueing behind the first.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::autosleep::AutosleepState;
use crate::errors::{PmError, PmResult};
use crate::state::{SleepState, TestLevel};

/// Bookkeeping protected by the lock's mutex.
#[derive(Debug, Default)]
pub struct LockState {
    held: bool,
    current: SleepState,
    pub autosleep: AutosleepState,
    pub test_level: TestLevel,
}

/// The one system-wide gate for sleep transitions.
#[derive(Debug, Default)]
pub struct SleepLock {
    inner: Mutex<LockState>,
}

impl SleepLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Short bookkeeping access. Never blocks behind a transition.
    pub fn state(&self) -> MutexGuard<'_, LockState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim the coordinator for one transition.
    ///
    /// Fails with `Busy` if another transition holds it. The returned guard
    /// carries the autosleep target observed at acquisition.
    pub fn acquire(&self) -> PmResult<TransitionGuard<'_>> {
        let mut state = self.state();
        if state.held || state.current != SleepState::On {
            return Err(PmError::Busy);
        }
        state.held = true;
        Ok(TransitionGuard {
            lock: self,
            autosleep_target: state.autosleep.target(),
            test_level: state.test_level,
        })
    }

    /// State being entered, `On` when idle. Unsynchronized snapshot for
    /// display purposes.
    pub fn current_state(&self) -> SleepState {
        self.state().current
    }

    pub fn is_held(&self) -> bool {
        self.state().held
    }
}

/// Exclusive claim on the coordinator; releases on drop.
#[derive(Debug)]
pub struct TransitionGuard<'a> {
    lock: &'a SleepLock,
    autosleep_target: SleepState,
    test_level: TestLevel,
}

impl TransitionGuard<'_> {
    /// Record the state being entered.
    pub fn enter(&self, state: SleepState) {
        self.lock.state().current = state;
    }

    /// Autosleep target at the moment the lock was acquired.
    pub fn autosleep_target(&self) -> SleepState {
        self.autosleep_target
    }

    /// `pm_test` level at the moment the lock was acquired.
    pub fn test_level(&self) -> TestLevel {
        self.test_level
    }
}

impl Drop for TransitionGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.lock.state();
        state.current = SleepState::On;
        state.held = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Decoded;

    #[test]
    fn test_acquire_release() {
        let lock = SleepLock::new();
        {
            let guard = lock.acquire().unwrap();
            assert!(lock.is_held());
            guard.enter(SleepState::Mem);
            assert_eq!(lock.current_state(), SleepState::Mem);
        }
        assert!(!lock.is_held());
        assert_eq!(lock.current_state(), SleepState::On);
    }

    #[test]
    fn test_second_acquire_is_busy() {
        let lock = SleepLock::new();
        let _guard = lock.acquire().unwrap();
        assert_eq!(lock.acquire().unwrap_err(), PmError::Busy);
    }

    #[test]
    fn test_held_before_state_recorded_is_busy() {
        let lock = SleepLock::new();
        let _guard = lock.acquire().unwrap();
        assert_eq!(lock.current_state(), SleepState::On);
        assert!(lock.acquire().is_err());
    }

    #[test]
    fn test_guard_captures_autosleep_and_test_level() {
        let lock = SleepLock::new();
        {
            let mut state = lock.state();
            state.autosleep.set(Decoded::Sleep(SleepState::Mem)).unwrap();
            state.test_level = TestLevel::Devices;
        }
        let guard = lock.acquire().unwrap();
        assert_eq!(guard.autosleep_target(), SleepState::Mem);
        assert_eq!(guard.test_level(), TestLevel::Devices);
    }

    #[test]
    fn test_release_on_panic_unwind() {
        let lock = std::sync::Arc::new(SleepLock::new());
        let inner = std::sync::Arc::clone(&lock);
        let result = std::thread::spawn(move || {
            let guard = inner.acquire().unwrap();
            guard.enter(SleepState::Freeze);
            panic!("engine exploded");
        })
        .join();
        assert!(result.is_err());
        assert!(!lock.is_held());
        assert!(lock.acquire().is_ok());
    }
}
