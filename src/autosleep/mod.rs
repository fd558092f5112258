//! Autosleep
//!
//! Stores and validates the automatic-sleep target and tracks the named
//! wakelocks that hold it off. The policy loop that periodically tries to
//! sleep lives outside this crate; it calls
//! [`SleepCoordinator::autosleep_attempt`](crate::coordinator::SleepCoordinator::autosleep_attempt)
//! once per iteration.

mod target;
mod wakelock;

pub use target::{decode_autosleep, AutosleepState};
pub use wakelock::{show_names, WakelockRegistry, WakelockRequest};

use crate::state::SleepState;

/// Result of one autosleep attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutosleepOutcome {
    /// No autosleep target is set.
    Disabled,
    /// Wakelocks are held; names listed.
    BlockedByWakelocks(Vec<String>),
    /// A wakeup event is in flight or raced the snapshot.
    WakeupPending,
    /// The system went to `state` and came back.
    Entered(SleepState),
}
