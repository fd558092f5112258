//! Autosleep target

use crate::errors::{PmError, PmResult};
use crate::state::{Decoded, SleepState, StateRegistry};

/// Decode an `autosleep` write.
///
/// Exactly `off` or `off\n` disables autosleep (`ExplicitOn`); anything
/// else must name an available sleep state.
pub fn decode_autosleep(registry: &StateRegistry, input: &[u8]) -> PmResult<Decoded> {
    match registry.decode(input) {
        Decoded::Sleep(state) => Ok(Decoded::Sleep(state)),
        _ if input == b"off" || input == b"off\n" => Ok(Decoded::ExplicitOn),
        _ => Err(PmError::invalid(format!(
            "'{}' is neither 'off' nor an available sleep state",
            String::from_utf8_lossy(input).trim_end()
        ))),
    }
}

/// The state autosleep drives the system into; `On` means disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AutosleepState {
    target: SleepState,
}

impl AutosleepState {
    pub fn target(&self) -> SleepState {
        self.target
    }

    pub fn is_enabled(&self) -> bool {
        self.target.is_sleep()
    }

    /// Apply a decoded request. Parse failures are rejected and leave the
    /// target unchanged.
    pub fn set(&mut self, request: Decoded) -> PmResult<SleepState> {
        self.target = match request {
            Decoded::ExplicitOn => SleepState::On,
            Decoded::Sleep(state) => state,
            Decoded::ParseFailure => {
                return Err(PmError::invalid("autosleep target did not decode"))
            }
        };
        Ok(self.target)
    }

    /// `off`, the target label, or `error` if the target is no longer
    /// available; newline terminated.
    pub fn show(&self, registry: &StateRegistry) -> String {
        let text = match self.target {
            SleepState::On => "off",
            state if registry.is_available(state) => state.label().unwrap_or("error"),
            _ => "error",
        };
        format!("{}\n", text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_off_variants() {
        let registry = StateRegistry::full();
        assert_eq!(decode_autosleep(&registry, b"off").unwrap(), Decoded::ExplicitOn);
        assert_eq!(decode_autosleep(&registry, b"off\n").unwrap(), Decoded::ExplicitOn);
        assert!(decode_autosleep(&registry, b"off\n\n").is_err());
        assert!(decode_autosleep(&registry, b"Off").is_err());
    }

    #[test]
    fn test_labels_and_garbage() {
        let registry = StateRegistry::full();
        assert_eq!(
            decode_autosleep(&registry, b"mem\n").unwrap(),
            Decoded::Sleep(SleepState::Mem)
        );
        assert_eq!(
            decode_autosleep(&registry, b"disk").unwrap(),
            Decoded::Sleep(SleepState::Hibernate)
        );
        assert!(matches!(
            decode_autosleep(&registry, b"bogus"),
            Err(PmError::InvalidInput(_))
        ));
        assert!(decode_autosleep(&registry, b"").is_err());
    }

    #[test]
    fn test_set_and_show() {
        let registry = StateRegistry::full();
        let mut autosleep = AutosleepState::default();
        assert_eq!(autosleep.show(&registry), "off\n");
        assert!(!autosleep.is_enabled());

        autosleep.set(Decoded::Sleep(SleepState::Mem)).unwrap();
        assert_eq!(autosleep.show(&registry), "mem\n");
        assert!(autosleep.is_enabled());

        autosleep.set(Decoded::Sleep(SleepState::Hibernate)).unwrap();
        assert_eq!(autosleep.show(&registry), "disk\n");

        autosleep.set(Decoded::ExplicitOn).unwrap();
        assert_eq!(autosleep.target(), SleepState::On);
    }

    #[test]
    fn test_parse_failure_keeps_target() {
        let mut autosleep = AutosleepState::default();
        autosleep.set(Decoded::Sleep(SleepState::Standby)).unwrap();
        assert!(autosleep.set(Decoded::ParseFailure).is_err());
        assert_eq!(autosleep.target(), SleepState::Standby);
    }

    #[test]
    fn test_show_error_for_unavailable_target() {
        let mut autosleep = AutosleepState::default();
        autosleep.set(Decoded::Sleep(SleepState::Standby)).unwrap();
        let narrower = StateRegistry::new(&[SleepState::Mem], false);
        assert_eq!(autosleep.show(&narrower), "error\n");
    }
}
