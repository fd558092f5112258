//! Wakeup-count guard
//!
//! - `WakeupSource`: read-only view of the external wakeup counter
//! - `WakeupEvents`: in-process implementation of that counter
//! - `WakeupCountGuard`: snapshot / compare-and-commit handshake

mod events;
mod guard;

pub use events::{WakeupCounts, WakeupEvents, WakeupSource};
pub use guard::WakeupCountGuard;
