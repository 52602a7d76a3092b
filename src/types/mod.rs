//! This module defines the core, strongly-typed data representations shared by
//! the loader, the store, and the summary pipeline.
//!
//! It currently includes the `Relation` wrapper, the `ColumnEncoding` enum that
//! records what the optimizer did to a column, and the catalog of column names
//! for the source and summary relations.

pub mod column_encoding;
pub mod columns;
pub mod relation;

// Re-export the main type(s) for easier access.
pub use column_encoding::ColumnEncoding;
pub use relation::{ColumnSummary, Relation};
