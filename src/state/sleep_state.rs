//! Sleep states and their control-surface labels

use std::fmt;

use serde::{Deserialize, Serialize};

/// System sleep states, ordered from shallowest to deepest.
///
/// `On` is the idle/awake state and has no label; it is never the result of
/// decoding a request.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SleepState {
    #[default]
    On,
    Freeze,
    Standby,
    Mem,
    #[serde(rename = "disk")]
    Hibernate,
}

impl SleepState {
    /// Suspend states in table order. Hibernation is handled separately.
    pub const SUSPEND_STATES: [SleepState; 3] =
        [SleepState::Freeze, SleepState::Standby, SleepState::Mem];

    /// Control-surface label, `None` for `On`.
    pub fn label(&self) -> Option<&'static str> {
        match self {
            SleepState::On => None,
            SleepState::Freeze => Some("freeze"),
            SleepState::Standby => Some("standby"),
            SleepState::Mem => Some("mem"),
            SleepState::Hibernate => Some("disk"),
        }
    }

    /// True for every state except `On`.
    pub fn is_sleep(&self) -> bool {
        !matches!(self, SleepState::On)
    }

    /// True for the states dispatched to the suspend engine.
    pub fn is_suspend(&self) -> bool {
        matches!(self, SleepState::Freeze | SleepState::Standby | SleepState::Mem)
    }
}

impl fmt::Display for SleepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label().unwrap_or("on"))
    }
}

/// Outcome of decoding a textual request.
///
/// `ExplicitOn` is only produced for the autosleep `off` keyword, so a typo
/// can never be mistaken for a request to disable autosleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    Sleep(SleepState),
    ExplicitOn,
    ParseFailure,
}

impl Decoded {
    /// The decoded sleep state, if any.
    pub fn sleep_state(&self) -> Option<SleepState> {
        match self {
            Decoded::Sleep(state) => Some(*state),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        assert_eq!(SleepState::On.label(), None);
        assert_eq!(SleepState::Mem.label(), Some("mem"));
        assert_eq!(SleepState::Hibernate.label(), Some("disk"));
        assert_eq!(SleepState::Hibernate.to_string(), "disk");
        assert_eq!(SleepState::On.to_string(), "on");
    }

    #[test]
    fn test_ordering() {
        assert!(SleepState::On < SleepState::Freeze);
        assert!(SleepState::Freeze < SleepState::Standby);
        assert!(SleepState::Standby < SleepState::Mem);
        assert!(SleepState::Mem < SleepState::Hibernate);
    }

    #[test]
    fn test_serde_uses_labels() {
        let json = serde_json::to_string(&[SleepState::Mem, SleepState::Hibernate]).unwrap();
        assert_eq!(json, r#"["mem","disk"]"#);
        let parsed: SleepState = serde_json::from_str(r#""standby""#).unwrap();
        assert_eq!(parsed, SleepState::Standby);
    }
}
