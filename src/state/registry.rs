//! Table of available sleep states and the request decoder

use super::sleep_state::{Decoded, SleepState};

/// Cut a request at its first newline.
///
/// Writes from a shell usually carry a trailing `\n`; everything from the
/// first newline on is ignored.
pub fn trim_request(input: &[u8]) -> &[u8] {
    match input.iter().position(|b| *b == b'\n') {
        Some(end) => &input[..end],
        None => input,
    }
}

/// The set of sleep states this platform supports.
///
/// Built once from capability flags; immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateRegistry {
    /// Availability of `SleepState::SUSPEND_STATES`, same order.
    suspend: [bool; 3],
    hibernation: bool,
}

impl StateRegistry {
    /// Registry with the given suspend states available. `On` and
    /// `Hibernate` in `available` are ignored; hibernation has its own flag.
    pub fn new(available: &[SleepState], hibernation: bool) -> Self {
        let mut suspend = [false; 3];
        for (slot, state) in suspend.iter_mut().zip(SleepState::SUSPEND_STATES) {
            *slot = available.contains(&state);
        }
        Self {
            suspend,
            hibernation,
        }
    }

    /// Every state supported.
    pub fn full() -> Self {
        Self::new(&SleepState::SUSPEND_STATES, true)
    }

    /// Whether `state` may be requested. `On` is never requestable.
    pub fn is_available(&self, state: SleepState) -> bool {
        match state {
            SleepState::On => false,
            SleepState::Hibernate => self.hibernation,
            s => SleepState::SUSPEND_STATES
                .iter()
                .position(|candidate| *candidate == s)
                .map(|idx| self.suspend[idx])
                .unwrap_or(false),
        }
    }

    /// Whether the hibernation label is accepted.
    pub fn hibernation_available(&self) -> bool {
        self.hibernation
    }

    /// Available states in table order, hibernation last.
    pub fn available(&self) -> Vec<SleepState> {
        let mut states: Vec<SleepState> = SleepState::SUSPEND_STATES
            .iter()
            .copied()
            .filter(|s| self.is_available(*s))
            .collect();
        if self.hibernation {
            states.push(SleepState::Hibernate);
        }
        states
    }

    /// Decode a request.
    ///
    /// The input is cut at the first newline, then compared with exact
    /// length and case against `disk` first and the suspend labels second.
    /// Labels of unavailable states decode to `ParseFailure`.
    pub fn decode(&self, input: &[u8]) -> Decoded {
        let request = trim_request(input);

        if self.hibernation && label_matches(SleepState::Hibernate, request) {
            return Decoded::Sleep(SleepState::Hibernate);
        }

        SleepState::SUSPEND_STATES
            .iter()
            .copied()
            .find(|state| self.is_available(*state) && label_matches(*state, request))
            .map(Decoded::Sleep)
            .unwrap_or(Decoded::ParseFailure)
    }

    /// Space-separated available labels, newline terminated; empty when
    /// nothing is available.
    pub fn show(&self) -> String {
        let labels: Vec<&str> = self.available().iter().filter_map(|s| s.label()).collect();
        if labels.is_empty() {
            return String::new();
        }
        let mut out = labels.join(" ");
        out.push('\n');
        out
    }
}

impl Default for StateRegistry {
    fn default() -> Self {
        Self::full()
    }
}

fn label_matches(state: SleepState, request: &[u8]) -> bool {
    state
        .label()
        .map(|label| label.as_bytes() == request)
        .unwrap_or(false)
}
