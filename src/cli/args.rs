//! CLI argument definitions using clap
//!
//! Commands:
//! - docshard query --config <path>
//! - docshard check-config --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// docshard - paginated queries over partitioned document stores
#[derive(Parser, Debug)]
#[command(name = "docshard")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load the dataset and answer JSON-lines requests from stdin
    Query {
        /// Path to configuration file
        #[arg(long, default_value = "./docshard.json")]
        config: PathBuf,
    },

    /// Validate a configuration file and print the effective settings
    CheckConfig {
        /// Path to configuration file
        #[arg(long, default_value = "./docshard.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
