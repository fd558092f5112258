//! Begin/complete logging around a unit of work
//!
//! - `{name}_BEGIN` on creation
//! - `{name}_COMPLETE` or `{name}_FAILED` when closed explicitly
//! - `{name}_INCOMPLETE` if dropped while still open (a panic in an engine)

use std::time::Instant;

use super::logger::{Logger, Severity};

/// A scope that logs the start and outcome of a unit of work.
///
/// Fields given at creation are repeated on every line so the lines of one
/// transition can be correlated by `request_id`.
pub struct ObservationScope {
    name: &'static str,
    fields: Vec<(&'static str, String)>,
    timer: Timer,
    closed: bool,
}

impl ObservationScope {
    /// Open a scope carrying `fields` on every line it logs
    pub fn with_fields(name: &'static str, fields: Vec<(&'static str, String)>) -> Self {
        let scope = Self {
            name,
            fields,
            timer: Timer::new(),
            closed: false,
        };
        scope.emit(Severity::Info, "BEGIN", &[]);
        scope
    }

    /// Close the scope successfully
    pub fn complete(mut self) {
        self.closed = true;
        let elapsed = self.timer.elapsed_ms();
        self.emit(Severity::Info, "COMPLETE", &[("elapsed_ms", &elapsed)]);
    }

    /// Close the scope as failed
    pub fn fail(mut self, reason: &str) {
        self.closed = true;
        let elapsed = self.timer.elapsed_ms();
        self.emit(
            Severity::Error,
            "FAILED",
            &[("elapsed_ms", &elapsed), ("reason", reason)],
        );
    }

    fn emit(&self, severity: Severity, suffix: &str, extra: &[(&str, &str)]) {
        let event = format!("{}_{}", self.name, suffix);
        let mut fields: Vec<(&str, &str)> =
            self.fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
        fields.extend_from_slice(extra);
        Logger::log(severity, &event, &fields);
    }
}

impl Drop for ObservationScope {
    fn drop(&mut self) {
        if !self.closed {
            self.emit(Severity::Warn, "INCOMPLETE", &[("reason", "scope dropped while open")]);
        }
    }
}

/// A simple duration timer for logging elapsed time
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Create a new timer
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed milliseconds as a string
    pub fn elapsed_ms(&self) -> String {
        self.start.elapsed().as_millis().to_string()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_open_until_closed() {
        let scope = ObservationScope::with_fields(
            "SLEEP_TRANSITION",
            vec![("state", "mem".to_string())],
        );
        assert!(!scope.closed);
        scope.complete();
    }

    #[test]
    fn test_scope_fail() {
        let scope = ObservationScope::with_fields("SLEEP_TRANSITION", Vec::new());
        scope.fail("device refused to suspend");
    }

    #[test]
    fn test_scope_drop_without_close() {
        let scope = ObservationScope::with_fields("SLEEP_TRANSITION", Vec::new());
        drop(scope);
    }

    #[test]
    fn test_timer() {
        let timer = Timer::new();
        std::thread::sleep(std::time::Duration::from_millis(10));
        let ms: u64 = timer.elapsed_ms().parse().unwrap();
        assert!(ms >= 10);
    }
}
