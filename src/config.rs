// In: src/config.rs

//! The single source of truth for all vendor-etl configuration.
//!
//! `EtlConfig` is created once at the application boundary (usually from a JSON
//! file, then patched by command-line flags) and the job-specific option structs
//! are derived from it. Nothing below the binary reads configuration globally.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EtlError, Result};
use crate::jobs::{IngestionOptions, ReportOptions};
use crate::loader::LoaderOptions;
use crate::optimizer::OptimizerOptions;
use crate::types::columns::SUMMARY_RELATION;

//==================================================================================
// I. Storage & Logging
//==================================================================================

/// Selects the relation store implementation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StorageConfig {
    /// Relations live only for the lifetime of the process. Useful for tests and dry runs.
    Memory,

    /// One Arrow IPC file per relation inside `dir`.
    ArrowIpc {
        dir: PathBuf,
        /// Write to a temporary file and rename over the target instead of
        /// dropping the old relation first.
        #[serde(default = "default_true")]
        atomic_replace: bool,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::ArrowIpc {
            dir: PathBuf::from("inventory"),
            atomic_replace: true,
        }
    }
}

/// Where and how verbosely log lines are written.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// One of `error`, `warn`, `info`, `debug`, `trace`, `off`.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Append-only log file. When absent, lines go to stderr.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_file: None,
        }
    }
}

//==================================================================================
// II. The Unified EtlConfig
//==================================================================================

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "snake_case")]
pub struct EtlConfig {
    /// Directory scanned by the ingestion job.
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,

    /// Only files with this extension (case-insensitive, no leading dot) are ingested.
    #[serde(default = "default_file_extension")]
    pub file_extension: String,

    /// **The maximum number of rows per chunk** read from a source file.
    #[serde(default = "default_chunk_size_rows")]
    pub chunk_size_rows: usize,

    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    #[serde(default = "default_true")]
    pub has_header: bool,

    /// Text columns whose `distinct / rows` ratio is below this become dictionary-encoded.
    #[serde(default = "default_category_ratio_threshold")]
    pub category_ratio_threshold: f64,

    /// Name of the relation the report job writes.
    #[serde(default = "default_summary_relation")]
    pub summary_relation: String,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            file_extension: default_file_extension(),
            chunk_size_rows: default_chunk_size_rows(),
            delimiter: default_delimiter(),
            has_header: true,
            category_ratio_threshold: default_category_ratio_threshold(),
            summary_relation: default_summary_relation(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl EtlConfig {
    /// Loads and validates a configuration file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: EtlConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size_rows == 0 {
            return Err(EtlError::Config(
                "chunk_size_rows must be greater than zero".to_string(),
            ));
        }
        if !(self.category_ratio_threshold > 0.0 && self.category_ratio_threshold <= 1.0) {
            return Err(EtlError::Config(format!(
                "category_ratio_threshold must be in (0, 1], got {}",
                self.category_ratio_threshold
            )));
        }
        if self.file_extension.trim_start_matches('.').is_empty() {
            return Err(EtlError::Config("file_extension must not be empty".to_string()));
        }
        if !self.delimiter.is_ascii() {
            return Err(EtlError::Config(format!(
                "delimiter must be a single ASCII character, got {:?}",
                self.delimiter
            )));
        }
        if self.summary_relation.is_empty() {
            return Err(EtlError::Config("summary_relation must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn loader_options(&self) -> LoaderOptions {
        LoaderOptions {
            chunk_size_rows: self.chunk_size_rows,
            delimiter: self.delimiter as u8,
            has_header: self.has_header,
            optimizer: OptimizerOptions {
                category_ratio_threshold: self.category_ratio_threshold,
            },
        }
    }

    pub fn ingestion_options(&self) -> IngestionOptions {
        IngestionOptions {
            file_extension: self.file_extension.trim_start_matches('.').to_string(),
            loader: self.loader_options(),
        }
    }

    pub fn report_options(&self) -> ReportOptions {
        ReportOptions {
            output_relation: self.summary_relation.clone(),
        }
    }
}

/// Helper for `serde` to default a boolean field to true.
fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_file_extension() -> String {
    "csv".to_string()
}

/// Helper for `serde` to provide a default for `chunk_size_rows`.
fn default_chunk_size_rows() -> usize {
    80_000
}

fn default_delimiter() -> char {
    ','
}

fn default_category_ratio_threshold() -> f64 {
    0.5
}

fn default_summary_relation() -> String {
    SUMMARY_RELATION.to_string()
}
