//! Failure statistics
//!
//! Purely diagnostic: nothing in the coordinator reads these back to make
//! a decision. Only transitions that were actually dispatched to an engine
//! are counted.

mod failure_ring;
mod suspend_stats;

pub use failure_ring::{FailureHistory, FailureRing, DEFAULT_FAILURE_DEPTH};
pub use suspend_stats::{SuspendStats, SuspendStatsSnapshot};
