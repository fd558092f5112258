//! Wakeup Race Tests
//!
//! The wakeup-count handshake:
//! - A stale count is refused and nothing is attempted
//! - An interrupted read reports -EINTR
//! - An event after the commit aborts the next transition in the engine

use std::sync::Arc;

use pmcore::config::PmConfig;
use pmcore::control::ControlSurface;
use pmcore::coordinator::{Platform, SleepCoordinator};
use pmcore::engine::{SimulatedPlatform, SuspendPhase};
use pmcore::errors::{errno, PmError};
use pmcore::wakeup::WakeupEvents;

struct Fixture {
    engine: Arc<SimulatedPlatform>,
    wakeup: Arc<WakeupEvents>,
    surface: ControlSurface,
}

fn fixture() -> Fixture {
    let engine = Arc::new(SimulatedPlatform::new());
    let wakeup = Arc::new(WakeupEvents::new());
    let platform = Platform::simulated(Arc::clone(&engine), Arc::clone(&wakeup));
    let coordinator = Arc::new(SleepCoordinator::new(&PmConfig::default(), platform).unwrap());
    Fixture {
        engine,
        wakeup,
        surface: ControlSurface::new(coordinator).unwrap(),
    }
}

/// Read V, an event bumps the counter to V+1, writing V back is refused.
#[test]
fn test_stale_count_is_refused() {
    let f = fixture();
    f.wakeup.report_event("rtc");
    let value = f.surface.read("wakeup_count").unwrap();
    assert_eq!(value, "1\n");

    f.wakeup.report_event("gpio-keys");
    let err = f.surface.write("wakeup_count", value.as_bytes()).unwrap_err();
    match &err {
        PmError::RaceLost {
            candidate, live, ..
        } => {
            assert_eq!(*candidate, 1);
            assert_eq!(*live, 2);
        }
        other => panic!("expected RaceLost, got {:?}", other),
    }
    assert_eq!(err.errno(), -errno::EINVAL);
    assert!(f.engine.history().is_empty());
    assert_eq!(f.surface.coordinator().saved_wakeup_count(), None);
    assert_eq!(f.surface.coordinator().metrics_snapshot().wakeup_races_lost, 1);
}

#[test]
fn test_race_lost_lists_active_sources() {
    let f = fixture();
    f.wakeup.stay_awake("usb");
    let err = f.surface.write("wakeup_count", b"0").unwrap_err();
    match err {
        PmError::RaceLost { active_sources, .. } => {
            assert_eq!(active_sources, vec!["usb".to_string()])
        }
        other => panic!("expected RaceLost, got {:?}", other),
    }
}

#[test]
fn test_unraced_count_is_committed() {
    let f = fixture();
    let value = f.surface.read("wakeup_count").unwrap();
    assert_eq!(f.surface.write("wakeup_count", value.as_bytes()), Ok(2));
    assert_eq!(f.surface.coordinator().saved_wakeup_count(), Some(0));

    assert_eq!(f.surface.write("state", b"mem"), Ok(3));
    assert_eq!(f.engine.history().len(), 1);
}

#[test]
fn test_interrupted_read_reports_eintr() {
    let f = fixture();
    f.wakeup.stay_awake("usb");
    f.wakeup.interrupt();

    let err = f.surface.read("wakeup_count").unwrap_err();
    assert_eq!(err, PmError::Interrupted);
    assert_eq!(err.errno(), -errno::EINTR);
}

#[test]
fn test_garbage_count_is_invalid() {
    let f = fixture();
    assert_eq!(
        f.surface.write_status("wakeup_count", b"twelve"),
        -(errno::EINVAL as i64)
    );
    assert_eq!(f.surface.coordinator().saved_wakeup_count(), None);
}

#[test]
fn test_count_write_busy_while_autosleep_enabled() {
    let f = fixture();
    f.surface.write("autosleep", b"mem").unwrap();
    assert_eq!(
        f.surface.write_status("wakeup_count", b"0"),
        -(errno::EBUSY as i64)
    );
}

/// An event after the commit makes the engine abort the next transition.
#[test]
fn test_event_after_commit_aborts_transition() {
    let f = fixture();
    f.surface.write("wakeup_count", b"0\n").unwrap();
    f.wakeup.report_event("rtc");

    let err = f.surface.write("state", b"mem").unwrap_err();
    assert_eq!(err.errno(), -errno::EBUSY);

    let stats = f.surface.coordinator().stats_snapshot();
    assert_eq!(stats.fail, 1);
    assert_eq!(stats.failed_suspend, 1);
    assert_eq!(stats.failures.phases[0], Some(SuspendPhase::Suspend));

    // Detection disarmed the baseline.
    assert_eq!(f.surface.write("state", b"mem"), Ok(3));
}
