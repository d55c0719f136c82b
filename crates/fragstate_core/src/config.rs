//! Store and logging configuration.
//!
//! # Responsibility
//! - Hold tunables for the state store and the logging bootstrap.
//! - Load them from a JSON document with every field defaulted.
//!
//! # Invariants
//! - An empty document (`{}`) yields the same values as `Default`.

use crate::logging::default_log_level;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

const DEFAULT_MAX_LOG_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_MAX_LOG_FILES: usize = 5;

/// What happens to fragments the server drops from a committed or pushed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrphanPolicy {
    /// Unload dropped fragments and destroy their identities.
    #[default]
    Release,
    /// Keep dropped fragments loaded and linked to their former owner.
    Retain,
}

/// State store tunables.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    pub orphan_policy: OrphanPolicy,
}

/// Rolling file logger settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of `trace|debug|info|warn|error`.
    pub level: String,
    /// Absolute directory for log files. Logging stays off when unset.
    pub log_dir: Option<PathBuf>,
    pub max_file_size_bytes: u64,
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            log_dir: None,
            max_file_size_bytes: DEFAULT_MAX_LOG_FILE_SIZE_BYTES,
            max_files: DEFAULT_MAX_LOG_FILES,
        }
    }
}

/// Top-level configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub store: StoreOptions,
    pub logging: LoggingConfig,
}

impl StoreConfig {
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(input).map_err(|err| ConfigError::Parse(err.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Parse(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(message) => write!(f, "invalid store config: {message}"),
        }
    }
}

impl Error for ConfigError {}
