//! CLI command implementations
//!
//! Every command that needs a coordinator boots one on the simulated
//! platform from the configuration file.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::PmConfig;
use crate::control::ControlSurface;
use crate::coordinator::{Platform, SleepCoordinator};
use crate::engine::SimulatedPlatform;
use crate::errors::write_status;
use crate::http_server::HttpServer;
use crate::observability::{log_event_with_fields, Event};
use crate::wakeup::WakeupEvents;

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{read_requests, write_error, write_pm_error, write_response};

/// A booted coordinator together with the handles a driver needs
pub struct Session {
    pub surface: Arc<ControlSurface>,
    pub engine: Arc<SimulatedPlatform>,
    pub wakeup: Arc<WakeupEvents>,
}

/// One request line of the `start` loop
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    /// Read an attribute
    Read { attribute: String },
    /// Write `value` to an attribute
    Write { attribute: String, value: String },
    /// Failure statistics
    Stats,
    /// Drive the simulated wakeup counter
    WakeupEvent {
        source: String,
        #[serde(default)]
        action: WakeupAction,
    },
    /// One autosleep policy iteration
    AutosleepAttempt,
    /// List attributes
    Attributes,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WakeupAction {
    /// Instantaneous event
    #[default]
    Report,
    /// Event processing begins
    StayAwake,
    /// Event processing ends
    Relax,
}

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Init { config } => init(&config),
        Command::Start { config } => start(&config),
        Command::Serve { config, port } => serve(&config, port),
        Command::Attrs { config } => attrs(&config),
    }
}

/// Load and validate the configuration file
pub fn load_config(config_path: &Path) -> CliResult<PmConfig> {
    let config = PmConfig::load(config_path)?;
    log_event_with_fields(
        Event::ConfigLoaded,
        &[("path", &config_path.display().to_string())],
    );
    Ok(config)
}

/// Boot a coordinator on the simulated platform
pub fn boot(config: &PmConfig) -> CliResult<Session> {
    let engine = Arc::new(SimulatedPlatform::with_latency(
        config.simulation.suspend_latency(),
    ));
    let wakeup = Arc::new(WakeupEvents::new());
    let platform = Platform::simulated(Arc::clone(&engine), Arc::clone(&wakeup));

    let coordinator = Arc::new(SleepCoordinator::new(config, platform)?);
    let surface = Arc::new(ControlSurface::new(coordinator)?);
    Ok(Session {
        surface,
        engine,
        wakeup,
    })
}

/// Write a default configuration file
///
/// Refuses to overwrite an existing file.
pub fn init(config_path: &Path) -> CliResult<()> {
    if config_path.exists() {
        return Err(CliError::already_initialized(
            &config_path.display().to_string(),
        ));
    }

    let content = serde_json::to_string_pretty(&PmConfig::default())?;
    fs::write(config_path, content + "\n").map_err(|e| {
        CliError::io_error(format!(
            "Failed to write {}: {}",
            config_path.display(),
            e
        ))
    })?;

    Ok(())
}

/// Boot and enter the JSON-lines serving loop
///
/// Malformed lines get an error response and the loop continues; an I/O
/// error on stdin ends it.
pub fn start(config_path: &Path) -> CliResult<()> {
    let config = load_config(config_path)?;
    let session = boot(&config)?;

    for line in read_requests() {
        match line {
            Ok(line) => match serde_json::from_str::<Request>(&line) {
                Ok(request) => handle(&session, request)?,
                Err(e) => {
                    let err = CliError::bad_request(e.to_string());
                    write_error(err.code_str(), err.message())?;
                }
            },
            Err(e) => {
                write_error(e.code_str(), e.message())?;
                break;
            }
        }
    }

    Ok(())
}

/// Execute one request and write its response line
pub fn handle(session: &Session, request: Request) -> CliResult<()> {
    match execute(session, request) {
        Ok(data) => write_response(data),
        Err(e) => write_pm_error(&e),
    }
}

/// Execute one request
pub fn execute(session: &Session, request: Request) -> crate::errors::PmResult<Value> {
    let surface = &session.surface;
    match request {
        Request::Read { attribute } => {
            let value = surface.read(&attribute)?;
            Ok(json!({ "attribute": attribute, "value": value }))
        }
        Request::Write { attribute, value } => {
            let result = surface.write(&attribute, value.as_bytes());
            let status = write_status(&result);
            let consumed = result?;
            Ok(json!({ "attribute": attribute, "consumed": consumed, "status": status }))
        }
        Request::Stats => Ok(json!({
            "report": surface.suspend_stats(),
            "stats": surface.coordinator().stats_snapshot(),
        })),
        Request::WakeupEvent { source, action } => {
            match action {
                WakeupAction::Report => session.wakeup.report_event(&source),
                WakeupAction::StayAwake => session.wakeup.stay_awake(&source),
                WakeupAction::Relax => {
                    if !session.wakeup.relax(&source) {
                        return Err(crate::errors::PmError::invalid(format!(
                            "no wakeup event open for '{}'",
                            source
                        )));
                    }
                }
            }
            Ok(json!({ "source": source, "count": session.wakeup.event_count(&source) }))
        }
        Request::AutosleepAttempt => {
            let outcome = surface.coordinator().autosleep_attempt()?;
            Ok(json!({ "outcome": format!("{:?}", outcome) }))
        }
        Request::Attributes => Ok(json!({ "attributes": surface.list() })),
    }
}

/// Serve the control surface over HTTP
pub fn serve(config_path: &Path, port: Option<u16>) -> CliResult<()> {
    let mut config = load_config(config_path)?;
    if let Some(port) = port {
        config.http.port = port;
    }
    let session = boot(&config)?;
    let server = HttpServer::with_config(config.http.clone(), session.surface);

    // Start the async runtime and run the server
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))?;

    rt.block_on(async {
        server
            .start()
            .await
            .map_err(|e| CliError::boot_failed(format!("HTTP server failed: {}", e)))
    })?;

    Ok(())
}

/// Print the attribute table
pub fn attrs(config_path: &Path) -> CliResult<()> {
    let config = load_config(config_path)?;
    let session = boot(&config)?;
    for info in session.surface.list() {
        println!("{} {}", info.mode.octal(), info.name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PmError;

    fn session() -> Session {
        boot(&PmConfig::default()).unwrap()
    }

    #[test]
    fn test_init_writes_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pmcore.json");
        init(&path).unwrap();

        let config = PmConfig::load(&path).unwrap();
        assert_eq!(config, PmConfig::default());
    }

    #[test]
    fn test_init_refuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pmcore.json");
        fs::write(&path, "{}").unwrap();
        assert!(init(&path).is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn test_request_parsing() {
        let request: Request =
            serde_json::from_str(r#"{"op":"write","attribute":"state","value":"mem\n"}"#).unwrap();
        assert_eq!(
            request,
            Request::Write {
                attribute: "state".to_string(),
                value: "mem\n".to_string()
            }
        );

        let request: Request =
            serde_json::from_str(r#"{"op":"wakeup_event","source":"rtc"}"#).unwrap();
        assert_eq!(
            request,
            Request::WakeupEvent {
                source: "rtc".to_string(),
                action: WakeupAction::Report
            }
        );
    }

    #[test]
    fn test_execute_write_and_stats() {
        let session = session();
        let data = execute(
            &session,
            Request::Write {
                attribute: "state".to_string(),
                value: "mem".to_string(),
            },
        )
        .unwrap();
        assert_eq!(data["consumed"], 3);
        assert_eq!(session.engine.history().len(), 1);

        let stats = execute(&session, Request::Stats).unwrap();
        assert_eq!(stats["stats"]["success"], 1);
    }

    #[test]
    fn test_execute_wakeup_race() {
        let session = session();
        let read = execute(
            &session,
            Request::Read {
                attribute: "wakeup_count".to_string(),
            },
        )
        .unwrap();
        assert_eq!(read["value"], "0\n");

        execute(
            &session,
            Request::WakeupEvent {
                source: "rtc".to_string(),
                action: WakeupAction::Report,
            },
        )
        .unwrap();
        let err = execute(
            &session,
            Request::Write {
                attribute: "wakeup_count".to_string(),
                value: "0".to_string(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, PmError::RaceLost { .. }));
    }

    #[test]
    fn test_relax_without_open_event() {
        let session = session();
        let err = execute(
            &session,
            Request::WakeupEvent {
                source: "usb".to_string(),
                action: WakeupAction::Relax,
            },
        )
        .unwrap_err();
        assert!(matches!(err, PmError::InvalidInput(_)));
    }
}
