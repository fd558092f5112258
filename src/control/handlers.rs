//! Show and store handlers for every control attribute
//!
//! Handlers only parse and format; all state lives in the coordinator.

use crate::autosleep::show_names;
use crate::coordinator::SleepCoordinator;
use crate::errors::{PmError, PmResult};
use crate::state::{trim_request, TestLevel};

fn text(input: &[u8]) -> PmResult<&str> {
    std::str::from_utf8(input).map_err(|_| PmError::invalid("input is not UTF-8"))
}

/// Parse a decimal value, allowing surrounding whitespace.
fn parse_decimal<T: std::str::FromStr>(input: &[u8], what: &str) -> PmResult<T> {
    let value = text(input)?.trim();
    value
        .parse::<T>()
        .map_err(|_| PmError::invalid(format!("invalid {} '{}'", what, value)))
}

fn flag(value: bool) -> String {
    let text = if value { "1\n" } else { "0\n" };
    text.to_string()
}

// ==================
// state
// ==================

pub(super) fn show_state(pm: &SleepCoordinator) -> PmResult<String> {
    Ok(pm.show_states())
}

pub(super) fn store_state(pm: &SleepCoordinator, input: &[u8]) -> PmResult<usize> {
    pm.request_transition(input)
}

// ==================
// wakeup_count
// ==================

pub(super) fn show_wakeup_count(pm: &SleepCoordinator) -> PmResult<String> {
    Ok(format!("{}\n", pm.read_wakeup_count()?))
}

pub(super) fn store_wakeup_count(pm: &SleepCoordinator, input: &[u8]) -> PmResult<usize> {
    let candidate = parse_decimal::<u64>(input, "wakeup count")?;
    pm.save_wakeup_count(candidate)?;
    Ok(input.len())
}

// ==================
// autosleep and wakelocks
// ==================

pub(super) fn show_autosleep(pm: &SleepCoordinator) -> PmResult<String> {
    Ok(pm.show_autosleep())
}

pub(super) fn store_autosleep(pm: &SleepCoordinator, input: &[u8]) -> PmResult<usize> {
    pm.set_autosleep(input)?;
    Ok(input.len())
}

pub(super) fn show_wake_lock(pm: &SleepCoordinator) -> PmResult<String> {
    Ok(show_names(&pm.active_wakelocks()))
}

pub(super) fn store_wake_lock(pm: &SleepCoordinator, input: &[u8]) -> PmResult<usize> {
    pm.acquire_wakelock(input)?;
    Ok(input.len())
}

pub(super) fn show_wake_unlock(pm: &SleepCoordinator) -> PmResult<String> {
    Ok(show_names(&pm.inactive_wakelocks()))
}

pub(super) fn store_wake_unlock(pm: &SleepCoordinator, input: &[u8]) -> PmResult<usize> {
    pm.release_wakelock(input)?;
    Ok(input.len())
}

// ==================
// debug knobs
// ==================

pub(super) fn show_pm_test(pm: &SleepCoordinator) -> PmResult<String> {
    Ok(TestLevel::show(pm.test_level()))
}

pub(super) fn store_pm_test(pm: &SleepCoordinator, input: &[u8]) -> PmResult<usize> {
    let level = TestLevel::parse(input).ok_or_else(|| {
        PmError::invalid(format!(
            "unknown pm_test level '{}'",
            String::from_utf8_lossy(trim_request(input))
        ))
    })?;
    pm.set_test_level(level);
    Ok(input.len())
}

pub(super) fn show_pm_async(pm: &SleepCoordinator) -> PmResult<String> {
    Ok(flag(pm.pm_async()))
}

pub(super) fn store_pm_async(pm: &SleepCoordinator, input: &[u8]) -> PmResult<usize> {
    match parse_decimal::<u64>(input, "pm_async value")? {
        0 => pm.set_pm_async(false),
        1 => pm.set_pm_async(true),
        other => return Err(PmError::invalid(format!("pm_async must be 0 or 1, got {}", other))),
    }
    Ok(input.len())
}

pub(super) fn show_pm_trace(pm: &SleepCoordinator) -> PmResult<String> {
    Ok(flag(pm.pm_trace()))
}

pub(super) fn store_pm_trace(pm: &SleepCoordinator, input: &[u8]) -> PmResult<usize> {
    let value = parse_decimal::<i64>(input, "pm_trace value")?;
    pm.set_pm_trace(value != 0);
    Ok(input.len())
}

pub(super) fn show_pm_trace_dev_match(pm: &SleepCoordinator) -> PmResult<String> {
    Ok(pm
        .pm_trace_dev_match()
        .map(|device| format!("{}\n", device))
        .unwrap_or_default())
}

pub(super) fn store_pm_trace_dev_match(_pm: &SleepCoordinator, _input: &[u8]) -> PmResult<usize> {
    Err(PmError::invalid("pm_trace_dev_match is not writable"))
}

pub(super) fn show_pm_freeze_timeout(pm: &SleepCoordinator) -> PmResult<String> {
    Ok(format!("{}\n", pm.freeze_timeout_ms()))
}

pub(super) fn store_pm_freeze_timeout(pm: &SleepCoordinator, input: &[u8]) -> PmResult<usize> {
    let timeout_ms = parse_decimal::<u32>(input, "freeze timeout")?;
    pm.set_freeze_timeout_ms(timeout_ms);
    Ok(input.len())
}
