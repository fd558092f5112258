//! CLI module for pmcore
//!
//! Provides command-line interface for:
//! - init: Write a default configuration
//! - start: Boot a coordinator and serve JSON lines on stdin
//! - serve: Serve the control surface over HTTP
//! - attrs: Print the attribute table

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{
    attrs, boot, execute, handle, init, load_config, run, run_command, serve, start, Request,
    Session, WakeupAction,
};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_requests, write_error, write_pm_error, write_response};
