// In: src/error.rs

//! This module defines the single, unified error type for the entire vendor-etl library.
//! It uses the `thiserror` crate to provide ergonomic, context-aware error handling.

use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EtlError>;

#[derive(Error, Debug)]
pub enum EtlError {
    // =========================================================================
    // === Pipeline Errors (the three kinds the jobs reason about)
    // =========================================================================
    /// A row could not be tokenized or parsed. Aborts the load of that file only.
    #[error("Malformed record in {}: {message}", path.display())]
    MalformedRecord { path: PathBuf, message: String },

    /// A source relation, join key, or measure column is absent or has an
    /// incompatible type. Fatal to the report job.
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// The storage backend could not persist a relation. Fatal.
    #[error("Failed to write relation '{relation}': {message}")]
    StorageWrite { relation: String, message: String },

    // =========================================================================
    // === Storage & Semantic Errors
    // =========================================================================
    #[error("Relation not found: {0}")]
    RelationNotFound(String),

    #[error("Failed to read relation '{relation}': {message}")]
    StorageRead { relation: String, message: String },

    #[error("Aggregation failed: {0}")]
    Aggregation(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Unsupported data type for this operation: {0}")]
    UnsupportedType(String),

    #[error("Internal logic error (this is a bug): {0}")]
    Internal(String),

    // =========================================================================
    // === External Error Wrappers (Using #[from] for automatic conversion)
    // =========================================================================
    /// An error originating from the Arrow library.
    #[error("Arrow operation failed: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// An error originating from the underlying I/O subsystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error from the Serde JSON library, typically while loading configuration.
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

impl EtlError {
    /// Builds a `StorageWrite` error for `relation` from any displayable cause.
    pub fn storage_write(relation: &str, cause: impl std::fmt::Display) -> Self {
        EtlError::StorageWrite {
            relation: relation.to_string(),
            message: cause.to_string(),
        }
    }

    /// Builds a `StorageRead` error for `relation` from any displayable cause.
    pub fn storage_read(relation: &str, cause: impl std::fmt::Display) -> Self {
        EtlError::StorageRead {
            relation: relation.to_string(),
            message: cause.to_string(),
        }
    }

    /// Returns `true` for errors that must stop a batch job rather than skip
    /// the current item.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EtlError::StorageWrite { .. } | EtlError::SchemaMismatch(_) | EtlError::Config(_)
        )
    }
}
