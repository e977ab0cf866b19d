//! Configuration
//!
//! Loaded from a JSON file. Every field has a default, so `{}` is a valid
//! configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::composite::FanoutMode;
use crate::document::{TextTokenizer, DEFAULT_WHITESPACE_CHARS};
use crate::observability::Severity;
use crate::partition::DEFAULT_KEY_FIELD;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Configuration file structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocshardConfig {
    /// Logical store name served by the CLI
    #[serde(default = "default_store_name")]
    pub store_name: String,

    /// Document key field
    #[serde(default = "default_key_field")]
    pub key_field: String,

    /// Number of partitions
    #[serde(default = "default_partitions")]
    pub partitions: u32,

    /// Page size used when a request does not give one
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,

    /// Upper bound for any page
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,

    /// Query partitions in parallel
    #[serde(default)]
    pub parallel_fanout: bool,

    /// Full-text token delimiters
    #[serde(default = "default_whitespace_chars")]
    pub text_whitespace_chars: String,

    /// Minimum log severity
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// JSON-lines dataset, one document per line
    #[serde(default)]
    pub data_file: Option<PathBuf>,
}

fn default_store_name() -> String {
    "documents".to_string()
}
fn default_key_field() -> String {
    DEFAULT_KEY_FIELD.to_string()
}
fn default_partitions() -> u32 {
    2
}
fn default_page_size() -> usize {
    100
}
fn default_max_page_size() -> usize {
    10_000
}
fn default_whitespace_chars() -> String {
    DEFAULT_WHITESPACE_CHARS.to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DocshardConfig {
    fn default() -> Self {
        Self {
            store_name: default_store_name(),
            key_field: default_key_field(),
            partitions: default_partitions(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            parallel_fanout: false,
            text_whitespace_chars: default_whitespace_chars(),
            log_level: default_log_level(),
            data_file: None,
        }
    }
}

impl DocshardConfig {
    /// Load and validate configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse and validate configuration JSON
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: DocshardConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store_name.is_empty() {
            return Err(ConfigError::Invalid("store_name cannot be empty".into()));
        }
        if self.key_field.is_empty() {
            return Err(ConfigError::Invalid("key_field cannot be empty".into()));
        }
        if self.partitions == 0 {
            return Err(ConfigError::Invalid("partitions must be > 0".into()));
        }
        if self.default_page_size == 0 {
            return Err(ConfigError::Invalid("default_page_size must be > 0".into()));
        }
        if self.max_page_size < self.default_page_size {
            return Err(ConfigError::Invalid(format!(
                "max_page_size ({}) must be >= default_page_size ({})",
                self.max_page_size, self.default_page_size
            )));
        }
        if self.text_whitespace_chars.is_empty() {
            return Err(ConfigError::Invalid(
                "text_whitespace_chars cannot be empty".into(),
            ));
        }
        if Severity::parse(&self.log_level).is_none() {
            return Err(ConfigError::Invalid(format!(
                "Invalid log_level: '{}'",
                self.log_level
            )));
        }
        Ok(())
    }

    pub fn fanout_mode(&self) -> FanoutMode {
        if self.parallel_fanout {
            FanoutMode::Parallel
        } else {
            FanoutMode::Sequential
        }
    }

    pub fn tokenizer(&self) -> TextTokenizer {
        TextTokenizer::new(self.text_whitespace_chars.clone())
    }

    /// Parsed `log_level`; a validated config always has one
    pub fn log_severity(&self) -> Severity {
        Severity::parse(&self.log_level).unwrap_or(Severity::Info)
    }
}
