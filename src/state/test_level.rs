//! `pm_test` debug levels
//!
//! A non-`none` level asks the engine to run the transition only up to that
//! stage and then unwind, so suspend paths can be exercised without actually
//! sleeping.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::registry::trim_request;

/// How far a test transition proceeds before unwinding.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TestLevel {
    #[default]
    None,
    Core,
    Processors,
    Platform,
    Devices,
    Freezer,
}

impl TestLevel {
    /// All levels in display order.
    pub const ALL: [TestLevel; 6] = [
        TestLevel::None,
        TestLevel::Core,
        TestLevel::Processors,
        TestLevel::Platform,
        TestLevel::Devices,
        TestLevel::Freezer,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TestLevel::None => "none",
            TestLevel::Core => "core",
            TestLevel::Processors => "processors",
            TestLevel::Platform => "platform",
            TestLevel::Devices => "devices",
            TestLevel::Freezer => "freezer",
        }
    }

    /// Exact match of the text before the first newline.
    pub fn parse(input: &[u8]) -> Option<TestLevel> {
        let request = trim_request(input);
        Self::ALL
            .iter()
            .copied()
            .find(|level| level.name().as_bytes() == request)
    }

    /// Every level, the `current` one in brackets, newline terminated.
    pub fn show(current: TestLevel) -> String {
        let mut out = String::new();
        for level in Self::ALL {
            if !out.is_empty() {
                out.push(' ');
            }
            if level == current {
                out.push('[');
                out.push_str(level.name());
                out.push(']');
            } else {
                out.push_str(level.name());
            }
        }
        out.push('\n');
        out
    }
}

impl fmt::Display for TestLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
