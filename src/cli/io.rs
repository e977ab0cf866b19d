//! JSON-lines I/O for the CLI
//!
//! - Input: one JSON request object per stdin line
//! - Output: one JSON response object per stdout line
//! - Logs never go to stdout

use std::io::{self, BufRead, Write};

use serde_json::{json, Value};

use super::errors::{CliError, CliResult};

/// Read JSON requests from stdin until EOF, skipping blank lines
pub fn read_requests() -> impl Iterator<Item = CliResult<Value>> {
    let stdin = io::stdin();
    parse_lines(stdin.lock())
}

/// Parse JSON-lines input, skipping blank lines
pub(crate) fn parse_lines<R: BufRead>(reader: R) -> impl Iterator<Item = CliResult<Value>> {
    reader.lines().filter_map(|line| match line {
        Err(e) => Some(Err(CliError::from(e))),
        Ok(line) if line.trim().is_empty() => None,
        Ok(line) => Some(serde_json::from_str(&line).map_err(CliError::from)),
    })
}

pub(crate) fn ok_envelope(data: Value) -> Value {
    json!({
        "status": "ok",
        "data": data
    })
}

pub(crate) fn error_envelope(code: &str, message: &str) -> Value {
    json!({
        "status": "error",
        "code": code,
        "message": message
    })
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    write_line(&ok_envelope(data))
}

/// Write an error response to stdout
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    write_line(&error_envelope(code, message))
}

fn write_line(response: &Value) -> CliResult<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, response)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}
