//! Named wakelocks
//!
//! A wakelock keeps autosleep from starting a transition while it is held.
//! Explicit `state` writes ignore wakelocks entirely.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::errors::{PmError, PmResult};
use crate::state::trim_request;

/// A parsed `wake_lock` write: `name` or `name timeout_ns`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakelockRequest {
    pub name: String,
    pub timeout: Option<Duration>,
}

impl WakelockRequest {
    pub fn parse(input: &[u8]) -> PmResult<Self> {
        let text = std::str::from_utf8(trim_request(input))
            .map_err(|_| PmError::invalid("wakelock name is not UTF-8"))?;
        let mut parts = text.split_whitespace();
        let name = parts
            .next()
            .ok_or_else(|| PmError::invalid("empty wakelock name"))?
            .to_string();
        let timeout = match parts.next() {
            Some(ns) => Some(Duration::from_nanos(ns.parse::<u64>().map_err(|_| {
                PmError::invalid(format!("invalid wakelock timeout '{}'", ns))
            })?)),
            None => None,
        };
        if parts.next().is_some() {
            return Err(PmError::invalid("trailing data after wakelock timeout"));
        }
        Ok(Self { name, timeout })
    }
}

#[derive(Debug, Default)]
struct Holds {
    /// Active holds and their optional expiry.
    active: BTreeMap<String, Option<Instant>>,
    inactive: BTreeSet<String>,
}

impl Holds {
    fn expire(&mut self, now: Instant) {
        let expired: Vec<String> = self
            .active
            .iter()
            .filter(|(_, deadline)| deadline.map(|d| d <= now).unwrap_or(false))
            .map(|(name, _)| name.clone())
            .collect();
        for name in expired {
            self.active.remove(&name);
            self.inactive.insert(name);
        }
    }
}

/// Registry of user-space wakelocks.
#[derive(Debug, Default)]
pub struct WakelockRegistry {
    holds: Mutex<Holds>,
}

impl WakelockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn holds(&self) -> MutexGuard<'_, Holds> {
        let mut holds = self.holds.lock().unwrap_or_else(PoisonError::into_inner);
        holds.expire(Instant::now());
        holds
    }

    /// Activate `request.name`, re-arming its timeout if already held.
    pub fn acquire(&self, request: &WakelockRequest) {
        let deadline = request.timeout.map(|t| Instant::now() + t);
        let mut holds = self.holds();
        holds.inactive.remove(&request.name);
        holds.active.insert(request.name.clone(), deadline);
    }

    /// Release an active hold.
    pub fn release(&self, name: &str) -> PmResult<()> {
        let mut holds = self.holds();
        if holds.active.remove(name).is_none() {
            return Err(PmError::invalid(format!("wakelock '{}' is not held", name)));
        }
        holds.inactive.insert(name.to_string());
        Ok(())
    }

    /// Active hold names, sorted.
    pub fn active(&self) -> Vec<String> {
        self.holds().active.keys().cloned().collect()
    }

    /// Released or expired hold names, sorted.
    pub fn inactive(&self) -> Vec<String> {
        self.holds().inactive.iter().cloned().collect()
    }
}

/// Space-separated names, newline terminated.
pub fn show_names(names: &[String]) -> String {
    let mut out = names.join(" ");
    out.push('\n');
    out
}
