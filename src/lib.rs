//! This file is the root of the `vendor_etl` Rust crate.
//!
//! Its responsibilities are strictly limited to:
//! 1.  Declaring all the top-level modules of the library (`loader`, `summary`, etc.)
//!     so the Rust compiler knows they exist.
//! 2.  Re-exporting the two job entry points and the types callers need to
//!     drive them, so the binary and embedding code use one flat path.

//==================================================================================
// 0. Constants
//==================================================================================
/// The crate version, automatically set from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
//==================================================================================
// 1. Module Declarations
//==================================================================================
pub mod config;
pub mod error;
pub mod jobs;
pub mod loader;
pub mod observability;
pub mod optimizer;
pub mod store;
pub mod summary;
pub mod types;

//==================================================================================
// 2. Public API
//==================================================================================
pub use config::{EtlConfig, LoggingConfig, StorageConfig};
pub use error::{EtlError, Result};
pub use jobs::{
    run_ingestion, run_summary_report, IngestionOptions, IngestionReport, ReportOptions,
    ReportSummary,
};
pub use store::{open_store, RelationStore};
pub use types::Relation;
