//! CLI module for docshard
//!
//! Provides command-line interface for:
//! - query: load a dataset into partitions and answer JSON-lines requests
//! - check-config: validate a configuration file

mod args;
mod commands;
mod errors;
mod io;
mod session;

pub use args::{Cli, Command};
pub use commands::{check_config, query, run, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_requests, write_error, write_response};
pub use session::{QuerySession, Request};
