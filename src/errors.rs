//! Error taxonomy of the sleep-state coordinator
//!
//! Every control-surface write reports either the number of bytes consumed
//! or a negative errno. [`PmError::errno`] is the single place where the
//! taxonomy is mapped onto those codes.

use thiserror::Error;

use crate::engine::DelegateFailure;

/// Negative-errno values reported by the control surface.
pub mod errno {
    pub const ENOENT: i32 = 2;
    pub const EINTR: i32 = 4;
    pub const EIO: i32 = 5;
    pub const ENOMEM: i32 = 12;
    pub const EBUSY: i32 = 16;
    pub const EINVAL: i32 = 22;
}

/// Errors produced by the coordinator and its control surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PmError {
    /// Malformed or unsupported input; no side effects happened.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A transition is already in flight, or autosleep owns the coordinator.
    #[error("Sleep transition in progress")]
    Busy,

    /// A wakeup event arrived between the snapshot and the commit.
    /// Reported to callers as invalid input.
    #[error("Wakeup count {candidate} is stale (live count {live})")]
    RaceLost {
        candidate: u64,
        live: u64,
        active_sources: Vec<String>,
    },

    /// Waiting for in-flight wakeup events was interrupted.
    #[error("Interrupted while wakeup events were in progress")]
    Interrupted,

    /// A resource the coordinator needs could not be allocated.
    #[error("Resource exhaustion: {0}")]
    ResourceExhaustion(String),

    /// The suspend or hibernation engine failed; its code is passed through.
    #[error("Transition failed during {}: code {}", .0.phase, .0.code)]
    Delegate(DelegateFailure),

    /// No attribute with this name exists on the control surface.
    #[error("Unknown attribute: {0}")]
    UnknownAttribute(String),

    /// The attribute exists but has no handler for the operation.
    #[error("Attribute {attribute} does not support {operation}")]
    Unsupported {
        attribute: String,
        operation: &'static str,
    },

    /// The coordinator was assembled from an inconsistent description.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PmError {
    /// Shorthand for [`PmError::InvalidInput`].
    pub fn invalid(message: impl Into<String>) -> Self {
        PmError::InvalidInput(message.into())
    }

    /// Negative errno reported for this error.
    pub fn errno(&self) -> i32 {
        match self {
            PmError::InvalidInput(_) | PmError::RaceLost { .. } | PmError::Config(_) => {
                -errno::EINVAL
            }
            PmError::Busy => -errno::EBUSY,
            PmError::Interrupted => -errno::EINTR,
            PmError::ResourceExhaustion(_) => -errno::ENOMEM,
            PmError::Delegate(failure) if failure.code < 0 => failure.code,
            PmError::Delegate(_) => -errno::EIO,
            PmError::UnknownAttribute(_) => -errno::ENOENT,
            PmError::Unsupported { .. } => -errno::EIO,
        }
    }

    /// Stable machine-readable kind, used in logs and HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            PmError::InvalidInput(_) => "invalid_input",
            PmError::Busy => "busy",
            PmError::RaceLost { .. } => "race_lost",
            PmError::Interrupted => "interrupted",
            PmError::ResourceExhaustion(_) => "resource_exhaustion",
            PmError::Delegate(_) => "delegate_failure",
            PmError::UnknownAttribute(_) => "unknown_attribute",
            PmError::Unsupported { .. } => "unsupported",
            PmError::Config(_) => "config",
        }
    }
}

/// Result type for coordinator operations
pub type PmResult<T> = Result<T, PmError>;

/// Collapse a write result into the status a sysfs-style caller sees:
/// bytes consumed, or a negative errno.
pub fn write_status(result: &PmResult<usize>) -> i64 {
    match result {
        Ok(consumed) => *consumed as i64,
        Err(e) => i64::from(e.errno()),
    }
}
