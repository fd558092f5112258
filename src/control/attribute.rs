//! Attribute table
//!
//! Each attribute is a name, an access mode and optional show/store
//! handlers. The table is built once from the coordinator's capabilities
//! and checked before the surface accepts requests.

use std::fmt;

use serde::Serialize;

use crate::coordinator::{Capabilities, SleepCoordinator};
use crate::errors::{PmError, PmResult};

use super::handlers::*;

pub type ShowFn = fn(&SleepCoordinator) -> PmResult<String>;
pub type StoreFn = fn(&SleepCoordinator, &[u8]) -> PmResult<usize>;

/// Access mode advertised for an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl Mode {
    pub fn readable(&self) -> bool {
        matches!(self, Mode::ReadOnly | Mode::ReadWrite)
    }

    pub fn writable(&self) -> bool {
        matches!(self, Mode::WriteOnly | Mode::ReadWrite)
    }

    /// `ls -l` style permission bits.
    pub fn octal(&self) -> &'static str {
        match self {
            Mode::ReadOnly => "0444",
            Mode::WriteOnly => "0200",
            Mode::ReadWrite => "0644",
        }
    }
}

/// One control attribute.
#[derive(Clone, Copy)]
pub struct Attribute {
    pub name: &'static str,
    pub mode: Mode,
    pub show: Option<ShowFn>,
    pub store: Option<StoreFn>,
}

impl Attribute {
    pub(super) fn read_write(name: &'static str, show: ShowFn, store: StoreFn) -> Self {
        Self {
            name,
            mode: Mode::ReadWrite,
            show: Some(show),
            store: Some(store),
        }
    }

    /// Handlers must exist exactly for the operations the mode advertises.
    pub(super) fn check(&self) -> PmResult<()> {
        if self.mode.readable() != self.show.is_some() {
            return Err(PmError::Config(format!(
                "attribute {} is {:?} but show handler present = {}",
                self.name,
                self.mode,
                self.show.is_some()
            )));
        }
        if self.mode.writable() != self.store.is_some() {
            return Err(PmError::Config(format!(
                "attribute {} is {:?} but store handler present = {}",
                self.name,
                self.mode,
                self.store.is_some()
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .finish()
    }
}

/// Attributes present on a coordinator with `caps`, in display order.
pub fn attribute_table(caps: &Capabilities) -> Vec<Attribute> {
    let mut table = vec![
        Attribute::read_write("state", show_state, store_state),
        Attribute::read_write("wakeup_count", show_wakeup_count, store_wakeup_count),
    ];
    if caps.autosleep {
        table.push(Attribute::read_write("autosleep", show_autosleep, store_autosleep));
    }
    if caps.wakelocks {
        table.push(Attribute::read_write("wake_lock", show_wake_lock, store_wake_lock));
        table.push(Attribute::read_write("wake_unlock", show_wake_unlock, store_wake_unlock));
    }
    if caps.pm_debug {
        table.push(Attribute::read_write("pm_test", show_pm_test, store_pm_test));
    }
    table.push(Attribute::read_write("pm_async", show_pm_async, store_pm_async));
    if caps.pm_trace {
        table.push(Attribute::read_write("pm_trace", show_pm_trace, store_pm_trace));
        table.push(Attribute::read_write(
            "pm_trace_dev_match",
            show_pm_trace_dev_match,
            store_pm_trace_dev_match,
        ));
    }
    if caps.freezer {
        table.push(Attribute::read_write(
            "pm_freeze_timeout",
            show_pm_freeze_timeout,
            store_pm_freeze_timeout,
        ));
    }
    table
}

/// Names that must be present for a capability set.
pub(super) fn required_names(caps: &Capabilities) -> Vec<&'static str> {
    let mut names = vec!["state", "wakeup_count", "pm_async"];
    if caps.autosleep {
        names.push("autosleep");
    }
    if caps.wakelocks {
        names.extend(["wake_lock", "wake_unlock"]);
    }
    if caps.pm_debug {
        names.push("pm_test");
    }
    if caps.pm_trace {
        names.extend(["pm_trace", "pm_trace_dev_match"]);
    }
    if caps.freezer {
        names.push("pm_freeze_timeout");
    }
    names
}
