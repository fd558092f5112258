//! Circular history of the most recent transition failures

use serde::Serialize;

use crate::engine::SuspendPhase;

/// Failure record depth used when none is configured.
pub const DEFAULT_FAILURE_DEPTH: usize = 2;

/// Three parallel fixed-size logs (device, code, phase) sharing one cursor.
#[derive(Debug, Clone)]
pub struct FailureRing {
    cursor: usize,
    devices: Vec<String>,
    codes: Vec<i32>,
    phases: Vec<Option<SuspendPhase>>,
}

/// Ring contents, most recent first. Every list has exactly `depth`
/// entries; slots never written hold empty values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureHistory {
    pub devices: Vec<String>,
    pub codes: Vec<i32>,
    pub phases: Vec<Option<SuspendPhase>>,
}

impl FailureRing {
    /// A ring holding `depth` records. A depth of zero is raised to one.
    pub fn new(depth: usize) -> Self {
        let depth = depth.max(1);
        Self {
            cursor: 0,
            devices: vec![String::new(); depth],
            codes: vec![0; depth],
            phases: vec![None; depth],
        }
    }

    pub fn depth(&self) -> usize {
        self.codes.len()
    }

    /// Overwrite the oldest slot and advance the cursor.
    pub fn record(&mut self, device: Option<&str>, code: i32, phase: SuspendPhase) {
        let slot = self.cursor;
        self.devices[slot] = device.unwrap_or_default().to_string();
        self.codes[slot] = code;
        self.phases[slot] = Some(phase);
        self.cursor = (slot + 1) % self.depth();
    }

    /// Entries ordered by `(cursor - 1 - i) mod depth`.
    pub fn read_all(&self) -> FailureHistory {
        let depth = self.depth();
        let order: Vec<usize> = (0..depth)
            .map(|i| (self.cursor + depth - 1 - i) % depth)
            .collect();
        FailureHistory {
            devices: order.iter().map(|&idx| self.devices[idx].clone()).collect(),
            codes: order.iter().map(|&idx| self.codes[idx]).collect(),
            phases: order.iter().map(|&idx| self.phases[idx]).collect(),
        }
    }
}

impl Default for FailureRing {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_DEPTH)
    }
}
