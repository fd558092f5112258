//! Control surface
//!
//! The named-attribute interface through which user space drives the
//! coordinator. Reads return text; writes return the number of bytes
//! consumed or a negative errno (see [`write_status`](crate::errors::write_status)).
//!
//! # Attributes
//!
//! - `state`, `wakeup_count`, `pm_async`: always present
//! - `autosleep`, `wake_lock`, `wake_unlock`, `pm_test`, `pm_trace`,
//!   `pm_trace_dev_match`, `pm_freeze_timeout`: present per capability
//!
//! `suspend_stats` is a separate read-only diagnostic report.

mod attribute;
mod handlers;

pub use attribute::{attribute_table, Attribute, Mode, ShowFn, StoreFn};

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;

use crate::coordinator::{Capabilities, SleepCoordinator};
use crate::errors::{write_status, PmError, PmResult};

/// Listing entry for one attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeInfo {
    pub name: &'static str,
    pub mode: Mode,
}

/// Dispatches attribute reads and writes to the coordinator.
pub struct ControlSurface {
    coordinator: Arc<SleepCoordinator>,
    attributes: Vec<Attribute>,
}

impl ControlSurface {
    /// Build the surface for `coordinator`'s capabilities.
    pub fn new(coordinator: Arc<SleepCoordinator>) -> PmResult<Self> {
        let attributes = attribute_table(&coordinator.capabilities());
        Self::with_attributes(coordinator, attributes)
    }

    /// Build the surface from an explicit table.
    ///
    /// Fails with `Config` if an attribute the capabilities require is
    /// missing, a name appears twice, or a mode does not match its handlers.
    pub fn with_attributes(
        coordinator: Arc<SleepCoordinator>,
        attributes: Vec<Attribute>,
    ) -> PmResult<Self> {
        check_table(&coordinator.capabilities(), &attributes)?;
        Ok(Self {
            coordinator,
            attributes,
        })
    }

    pub fn coordinator(&self) -> &Arc<SleepCoordinator> {
        &self.coordinator
    }

    fn attribute(&self, name: &str) -> PmResult<&Attribute> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .ok_or_else(|| PmError::UnknownAttribute(name.to_string()))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.attributes.iter().map(|a| a.name).collect()
    }

    pub fn list(&self) -> Vec<AttributeInfo> {
        self.attributes
            .iter()
            .map(|a| AttributeInfo {
                name: a.name,
                mode: a.mode,
            })
            .collect()
    }

    /// Read attribute `name`.
    pub fn read(&self, name: &str) -> PmResult<String> {
        let attr = self.attribute(name)?;
        let show = attr.show.ok_or_else(|| PmError::Unsupported {
            attribute: name.to_string(),
            operation: "read",
        })?;
        show(&self.coordinator)
    }

    /// Write `input` to attribute `name`; returns bytes consumed.
    pub fn write(&self, name: &str, input: &[u8]) -> PmResult<usize> {
        let attr = self.attribute(name)?;
        let store = attr.store.ok_or_else(|| PmError::Unsupported {
            attribute: name.to_string(),
            operation: "write",
        })?;
        store(&self.coordinator, input)
    }

    /// Write and collapse the result into bytes consumed or a negative errno.
    pub fn write_status(&self, name: &str, input: &[u8]) -> i64 {
        write_status(&self.write(name, input))
    }

    /// The `suspend_stats` diagnostic report.
    pub fn suspend_stats(&self) -> String {
        self.coordinator.stats_report()
    }
}

fn check_table(caps: &Capabilities, attributes: &[Attribute]) -> PmResult<()> {
    let mut seen = BTreeSet::new();
    for attr in attributes {
        if !seen.insert(attr.name) {
            return Err(PmError::Config(format!("duplicate attribute {}", attr.name)));
        }
        attr.check()?;
    }
    let missing: Vec<_> = attribute::required_names(caps)
        .into_iter()
        .filter(|name| !seen.contains(name))
        .collect();
    if !missing.is_empty() {
        return Err(PmError::Config(format!(
            "missing attributes: {}",
            missing.join(", ")
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PmConfig;
    use crate::coordinator::Platform;
    use crate::engine::SimulatedPlatform;
    use crate::errors::errno;
    use crate::wakeup::WakeupEvents;

    fn surface(config: &PmConfig) -> ControlSurface {
        let platform = Platform::simulated(
            Arc::new(SimulatedPlatform::new()),
            Arc::new(WakeupEvents::new()),
        );
        let coordinator = Arc::new(SleepCoordinator::new(config, platform).unwrap());
        ControlSurface::new(coordinator).unwrap()
    }

    #[test]
    fn test_unknown_attribute() {
        let surface = surface(&PmConfig::default());
        assert_eq!(surface.write_status("bogus", b"1"), -(errno::ENOENT as i64));
        assert!(matches!(surface.read("bogus"), Err(PmError::UnknownAttribute(_))));
    }

    #[test]
    fn test_missing_capability_hides_attribute() {
        let surface = surface(&PmConfig::default());
        assert!(!surface.names().contains(&"pm_trace"));
        assert!(surface.read("pm_trace").is_err());

        let traced = surface_with_trace();
        assert_eq!(traced.read("pm_trace").unwrap(), "0\n");
    }

    fn surface_with_trace() -> ControlSurface {
        surface(&PmConfig {
            pm_trace: true,
            ..PmConfig::default()
        })
    }

    #[test]
    fn test_incomplete_table_rejected() {
        let surface = surface(&PmConfig::default());
        let table: Vec<_> = attribute_table(&surface.coordinator().capabilities())
            .into_iter()
            .filter(|a| a.name != "wakeup_count")
            .collect();
        let err = ControlSurface::with_attributes(Arc::clone(surface.coordinator()), table)
            .err()
            .unwrap();
        assert!(matches!(err, PmError::Config(_)));
    }

    #[test]
    fn test_duplicate_attribute_rejected() {
        let surface = surface(&PmConfig::default());
        let mut table = attribute_table(&surface.coordinator().capabilities());
        table.push(table[0]);
        assert!(ControlSurface::with_attributes(Arc::clone(surface.coordinator()), table).is_err());
    }

    #[test]
    fn test_read_only_attribute_refuses_write() {
        let surface = surface(&PmConfig::default());
        let mut table = attribute_table(&surface.coordinator().capabilities());
        for attr in table.iter_mut().filter(|a| a.name == "pm_async") {
            attr.mode = Mode::ReadOnly;
            attr.store = None;
        }
        let surface =
            ControlSurface::with_attributes(Arc::clone(surface.coordinator()), table).unwrap();
        assert_eq!(surface.write_status("pm_async", b"1"), -(errno::EIO as i64));
        assert_eq!(surface.read("pm_async").unwrap(), "1\n");
    }

    #[test]
    fn test_pm_trace_store() {
        let surface = surface_with_trace();
        assert_eq!(surface.write("pm_trace", b"7\n"), Ok(2));
        assert_eq!(surface.read("pm_trace").unwrap(), "1\n");
        assert_eq!(surface.write("pm_trace", b"0"), Ok(1));
        assert_eq!(surface.read("pm_trace").unwrap(), "0\n");
        assert!(surface.write("pm_trace", b"yes").is_err());
    }

    #[test]
    fn test_pm_trace_dev_match_refuses_writes() {
        let surface = surface_with_trace();
        assert_eq!(surface.read("pm_trace_dev_match").unwrap(), "");
        assert_eq!(
            surface.write_status("pm_trace_dev_match", b"usb1"),
            -(errno::EINVAL as i64)
        );
    }

    #[test]
    fn test_freeze_timeout_round_trip() {
        let surface = surface(&PmConfig::default());
        assert_eq!(surface.read("pm_freeze_timeout").unwrap(), "20000\n");
        assert_eq!(surface.write("pm_freeze_timeout", b"100\n"), Ok(4));
        assert_eq!(surface.read("pm_freeze_timeout").unwrap(), "100\n");
    }

    #[test]
    fn test_listing_modes() {
        let surface = surface(&PmConfig::default());
        let listing = surface.list();
        assert_eq!(listing[0].name, "state");
        assert_eq!(listing[0].mode, Mode::ReadWrite);
    }
}
