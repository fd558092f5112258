//! JSON I/O handling for CLI
//!
//! - Input: one JSON object per line on stdin
//! - Output: one JSON object per line on stdout
//! - UTF-8 only

use std::io::{self, BufRead, Write};

use serde_json::Value;

use super::errors::{CliError, CliResult};
use crate::errors::PmError;

/// Read request lines from stdin, skipping blank lines
pub fn read_requests() -> impl Iterator<Item = CliResult<String>> {
    let stdin = io::stdin();
    stdin.lock().lines().filter_map(|line| match line {
        Ok(line) if line.trim().is_empty() => None,
        Ok(line) => Some(Ok(line)),
        Err(e) => Some(Err(CliError::from(e))),
    })
}

fn emit(response: &Value) -> CliResult<()> {
    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, response)?;
    writeln!(stdout)?;
    stdout.flush()?;

    Ok(())
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    emit(&serde_json::json!({
        "status": "ok",
        "data": data
    }))
}

/// Write an error response to stdout
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    emit(&serde_json::json!({
        "status": "error",
        "code": code,
        "message": message
    }))
}

/// Write a coordinator error, including the errno a sysfs caller would see
pub fn write_pm_error(error: &PmError) -> CliResult<()> {
    emit(&serde_json::json!({
        "status": "error",
        "code": error.kind(),
        "errno": error.errno(),
        "message": error.to_string()
    }))
}
