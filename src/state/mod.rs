//! State registry
//!
//! - `SleepState`: the ordered set of system sleep states
//! - `StateRegistry`: which of them this platform supports, plus the
//!   text decoder and the `state` attribute rendering
//! - `TestLevel`: the `pm_test` debug levels

mod registry;
mod sleep_state;
mod test_level;

pub use registry::{trim_request, StateRegistry};
pub use sleep_state::{Decoded, SleepState};
pub use test_level::TestLevel;
