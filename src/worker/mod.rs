//! Async suspend worker
//!
//! Runs every `state` write on a single dedicated thread. The caller blocks
//! until its own request has completed, with the freezer opt-out handled by
//! the coordinator around the call.

mod suspend_worker;

pub use suspend_worker::{SuspendWorkItem, SuspendWorker, WorkerUnavailable};
