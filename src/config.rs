//! Coordinator configuration
//!
//! Loaded from a JSON file. Every field has a default, so `{}` is a valid
//! configuration describing a platform that supports every sleep state.
//! Capability flags decide which states are accepted and which control
//! attributes exist.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http_server::HttpServerConfig;
use crate::observability::Severity;
use crate::state::{SleepState, StateRegistry};
use crate::stats::DEFAULT_FAILURE_DEPTH;

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Settings of the simulated platform used by the CLI and the HTTP server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// How long a simulated transition "sleeps" (default: 0)
    #[serde(default)]
    pub suspend_latency_ms: u64,
}

impl SimulationConfig {
    pub fn suspend_latency(&self) -> Duration {
        Duration::from_millis(self.suspend_latency_ms)
    }
}

/// Coordinator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PmConfig {
    /// Suspend states the platform supports (default: freeze, standby, mem)
    #[serde(default = "default_suspend_states")]
    pub suspend_states: Vec<SleepState>,

    /// Suspend-to-disk support (default: true)
    #[serde(default = "default_true")]
    pub hibernation: bool,

    /// `autosleep` attribute (default: true)
    #[serde(default = "default_true")]
    pub autosleep: bool,

    /// `wake_lock` / `wake_unlock` attributes (default: true)
    #[serde(default = "default_true")]
    pub wakelocks: bool,

    /// `pm_test` attribute (default: true)
    #[serde(default = "default_true")]
    pub pm_debug: bool,

    /// `pm_trace` attribute (default: false)
    #[serde(default)]
    pub pm_trace: bool,

    /// `pm_freeze_timeout` attribute (default: true)
    #[serde(default = "default_true")]
    pub freezer: bool,

    /// Run transitions on the dedicated suspend worker (default: true)
    #[serde(default = "default_true")]
    pub async_suspend_worker: bool,

    /// Initial `pm_async` value (default: true)
    #[serde(default = "default_true")]
    pub pm_async: bool,

    /// Initial `pm_freeze_timeout` in milliseconds (default: 20000)
    #[serde(default = "default_freeze_timeout_ms")]
    pub freeze_timeout_ms: u32,

    /// Depth of the recent-failure history (default: 2)
    #[serde(default = "default_failure_record_depth")]
    pub failure_record_depth: usize,

    /// Minimum log severity (default: "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub simulation: SimulationConfig,

    #[serde(default)]
    pub http: HttpServerConfig,
}

fn default_true() -> bool {
    true
}

fn default_suspend_states() -> Vec<SleepState> {
    SleepState::SUSPEND_STATES.to_vec()
}

fn default_freeze_timeout_ms() -> u32 {
    20_000
}

fn default_failure_record_depth() -> usize {
    DEFAULT_FAILURE_DEPTH
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for PmConfig {
    fn default() -> Self {
        Self {
            suspend_states: default_suspend_states(),
            hibernation: true,
            autosleep: true,
            wakelocks: true,
            pm_debug: true,
            pm_trace: false,
            freezer: true,
            async_suspend_worker: true,
            pm_async: true,
            freeze_timeout_ms: default_freeze_timeout_ms(),
            failure_record_depth: default_failure_record_depth(),
            log_level: default_log_level(),
            simulation: SimulationConfig::default(),
            http: HttpServerConfig::default(),
        }
    }
}

impl PmConfig {
    /// Load and validate configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Parse and validate configuration text
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: PmConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the coordinator cannot be built from
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(state) = self.suspend_states.iter().find(|s| !s.is_suspend()) {
            return Err(ConfigError::Invalid(format!(
                "suspend_states may only list freeze, standby and mem (found '{}'); \
                 use the hibernation flag for disk",
                state
            )));
        }

        if self.failure_record_depth == 0 {
            return Err(ConfigError::Invalid(
                "failure_record_depth must be > 0".to_string(),
            ));
        }

        if Severity::parse(&self.log_level).is_none() {
            return Err(ConfigError::Invalid(format!(
                "Unknown log_level '{}'",
                self.log_level
            )));
        }

        Ok(())
    }

    /// Minimum log severity; `Info` if the level does not parse.
    pub fn severity(&self) -> Severity {
        Severity::parse(&self.log_level).unwrap_or(Severity::Info)
    }

    /// State table described by the capability flags.
    ///
    /// `hibernation_engine` says whether a hibernation engine is actually
    /// present; disk is offered only when both agree.
    pub fn state_registry(&self, hibernation_engine: bool) -> StateRegistry {
        StateRegistry::new(&self.suspend_states, self.hibernation && hibernation_engine)
    }

    pub fn freeze_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.freeze_timeout_ms))
    }
}
