//! Suspend statistics and the `suspend_stats` report

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::engine::{DelegateFailure, SuspendPhase};

use super::failure_ring::{FailureHistory, FailureRing};

/// Outcome counters of dispatched transitions.
#[derive(Debug, Clone, Default)]
pub struct SuspendStats {
    success: u64,
    fail: u64,
    failed_freeze: u64,
    failed_prepare: u64,
    failed_suspend: u64,
    failed_suspend_late: u64,
    failed_suspend_noirq: u64,
    failed_resume: u64,
    failed_resume_early: u64,
    failed_resume_noirq: u64,
    last_success_at: Option<DateTime<Utc>>,
    last_failure_at: Option<DateTime<Utc>>,
    ring: FailureRing,
}

/// Serializable copy of [`SuspendStats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuspendStatsSnapshot {
    pub success: u64,
    pub fail: u64,
    pub failed_freeze: u64,
    pub failed_prepare: u64,
    pub failed_suspend: u64,
    pub failed_suspend_late: u64,
    pub failed_suspend_noirq: u64,
    pub failed_resume: u64,
    pub failed_resume_early: u64,
    pub failed_resume_noirq: u64,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub failures: FailureHistory,
}

impl SuspendStats {
    /// Stats keeping the last `depth` failures.
    pub fn new(depth: usize) -> Self {
        Self {
            ring: FailureRing::new(depth),
            ..Self::default()
        }
    }

    pub fn record_success(&mut self) {
        self.success += 1;
        self.last_success_at = Some(Utc::now());
    }

    pub fn record_failure(&mut self, failure: &DelegateFailure) {
        self.fail += 1;
        self.last_failure_at = Some(Utc::now());
        *self.phase_counter(failure.phase) += 1;
        self.ring
            .record(failure.device.as_deref(), failure.code, failure.phase);
    }

    fn phase_counter(&mut self, phase: SuspendPhase) -> &mut u64 {
        match phase {
            SuspendPhase::Freeze => &mut self.failed_freeze,
            SuspendPhase::Prepare => &mut self.failed_prepare,
            SuspendPhase::Suspend => &mut self.failed_suspend,
            SuspendPhase::SuspendLate => &mut self.failed_suspend_late,
            SuspendPhase::SuspendNoirq => &mut self.failed_suspend_noirq,
            SuspendPhase::Resume => &mut self.failed_resume,
            SuspendPhase::ResumeEarly => &mut self.failed_resume_early,
            SuspendPhase::ResumeNoirq => &mut self.failed_resume_noirq,
        }
    }

    pub fn success(&self) -> u64 {
        self.success
    }

    pub fn fail(&self) -> u64 {
        self.fail
    }

    /// Recent failures, most recent first.
    pub fn failures(&self) -> FailureHistory {
        self.ring.read_all()
    }

    pub fn snapshot(&self) -> SuspendStatsSnapshot {
        SuspendStatsSnapshot {
            success: self.success,
            fail: self.fail,
            failed_freeze: self.failed_freeze,
            failed_prepare: self.failed_prepare,
            failed_suspend: self.failed_suspend,
            failed_suspend_late: self.failed_suspend_late,
            failed_suspend_noirq: self.failed_suspend_noirq,
            failed_resume: self.failed_resume,
            failed_resume_early: self.failed_resume_early,
            failed_resume_noirq: self.failed_resume_noirq,
            last_success_at: self.last_success_at,
            last_failure_at: self.last_failure_at,
            failures: self.ring.read_all(),
        }
    }

    /// Text report in the classic `suspend_stats` layout.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(512);
        let counters: [(&str, u64); 10] = [
            ("success", self.success),
            ("fail", self.fail),
            ("failed_freeze", self.failed_freeze),
            ("failed_prepare", self.failed_prepare),
            ("failed_suspend", self.failed_suspend),
            ("failed_suspend_late", self.failed_suspend_late),
            ("failed_suspend_noirq", self.failed_suspend_noirq),
            ("failed_resume", self.failed_resume),
            ("failed_resume_early", self.failed_resume_early),
            ("failed_resume_noirq", self.failed_resume_noirq),
        ];
        for (name, value) in counters {
            let _ = writeln!(out, "{}: {}", name, value);
        }

        let history = self.ring.read_all();
        out.push_str("failures:\n");
        render_column(&mut out, "last_failed_dev", history.devices.iter().map(String::as_str));
        let codes: Vec<String> = history.codes.iter().map(|c| c.to_string()).collect();
        render_column(&mut out, "last_failed_errno", codes.iter().map(String::as_str));
        render_column(
            &mut out,
            "last_failed_step",
            history.phases.iter().map(|p| p.map(|p| p.name()).unwrap_or("")),
        );
        out
    }
}

fn render_column<'a>(out: &mut String, title: &str, values: impl Iterator<Item = &'a str>) {
    for (i, value) in values.enumerate() {
        if i == 0 {
            let _ = writeln!(out, "  {}:\t{}", title, value);
        } else {
            let _ = writeln!(out, "\t\t\t{}", value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let mut stats = SuspendStats::new(2);
        stats.record_success();
        stats.record_failure(&DelegateFailure::new(-16, SuspendPhase::Freeze));
        stats.record_failure(&DelegateFailure::new(-5, SuspendPhase::SuspendNoirq));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.success, 1);
        assert_eq!(snapshot.fail, 2);
        assert_eq!(snapshot.failed_freeze, 1);
        assert_eq!(snapshot.failed_suspend_noirq, 1);
        assert_eq!(snapshot.failed_prepare, 0);
        assert!(snapshot.last_success_at.is_some());
        assert!(snapshot.last_failure_at.is_some());
    }

    #[test]
    fn test_render_empty() {
        let report = SuspendStats::new(2).render();
        assert!(report.starts_with("success: 0\nfail: 0\nfailed_freeze: 0\n"));
        assert!(report.contains("failures:\n  last_failed_dev:\t\n\t\t\t\n"));
        assert!(report.contains("  last_failed_errno:\t0\n\t\t\t0\n"));
        assert!(report.ends_with("  last_failed_step:\t\n\t\t\t\n"));
    }

    #[test]
    fn test_render_most_recent_first() {
        let mut stats = SuspendStats::new(2);
        stats.record_failure(&DelegateFailure::new(-5, SuspendPhase::Suspend).with_device("mmc0"));
        stats.record_failure(&DelegateFailure::new(-110, SuspendPhase::Resume).with_device("usb1"));

        let report = stats.render();
        assert!(report.contains("  last_failed_dev:\tusb1\n\t\t\tmmc0\n"));
        assert!(report.contains("  last_failed_errno:\t-110\n\t\t\t-5\n"));
        assert!(report.contains("  last_failed_step:\tresume\n\t\t\tsuspend\n"));
        assert!(report.contains("failed_resume: 1\n"));
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut stats = SuspendStats::new(2);
        stats.record_failure(&DelegateFailure::new(-5, SuspendPhase::SuspendLate));
        let json = serde_json::to_value(stats.snapshot()).unwrap();
        assert_eq!(json["failed_suspend_late"], 1);
        assert_eq!(json["failures"]["phases"][0], "suspend_late");
    }
}
