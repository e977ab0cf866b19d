//! CLI command implementations
//!
//! `query` loads the dataset once, then answers one request per stdin line
//! until EOF. A failing request is reported on stdout and the loop goes on.

use std::path::Path;

use serde_json::Value;

use super::args::Command;
use super::errors::CliResult;
use super::io::{read_requests, write_error, write_response};
use super::session::QuerySession;
use crate::config::DocshardConfig;
use crate::observability::{log_event_with_fields, Event, Logger};

/// Main CLI entry point
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Query { config } => query(&config),
        Command::CheckConfig { config } => check_config(&config),
    }
}

/// Loads the configuration and applies its log level
fn load_config(config_path: &Path) -> CliResult<DocshardConfig> {
    let config = DocshardConfig::load(config_path)?;
    Logger::set_min_severity(config.log_severity());

    let path = config_path.display().to_string();
    let partitions = config.partitions.to_string();
    log_event_with_fields(
        Event::ConfigLoaded,
        &[
            ("path", path.as_str()),
            ("store", config.store_name.as_str()),
            ("partitions", partitions.as_str()),
        ],
    );
    Ok(config)
}

/// Validate a configuration file and print it with defaults filled in
pub fn check_config(config_path: &Path) -> CliResult<()> {
    let config = load_config(config_path)?;
    write_response(serde_json::to_value(&config)?)
}

/// Serve JSON-lines requests from stdin
pub fn query(config_path: &Path) -> CliResult<()> {
    let config = load_config(config_path)?;
    let session = QuerySession::open(config)?;

    for request in read_requests() {
        match request {
            Ok(request) => respond(&session, &request)?,
            Err(e) => {
                log_event_with_fields(Event::RequestRejected, &[("reason", e.message())]);
                write_error(e.code_str(), e.message())?;
            }
        }
    }
    Ok(())
}

fn respond(session: &QuerySession, request: &Value) -> CliResult<()> {
    match session.handle(request) {
        Ok(data) => write_response(data),
        Err(e) => {
            let reason = e.to_string();
            log_event_with_fields(
                Event::RequestRejected,
                &[("code", e.code()), ("reason", reason.as_str())],
            );
            write_error(e.code(), &reason)
        }
    }
}
