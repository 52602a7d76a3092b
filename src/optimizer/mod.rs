//! Per-chunk physical type optimization.
//!
//! The optimizer is a pure, stateless transform: one `RecordBatch` in, one
//! `RecordBatch` out with identical logical values and a smaller footprint.
//! It never looks beyond the chunk it is given, so its cardinality estimates
//! are chunk-local by construction.

pub mod type_optimizer;

pub use type_optimizer::{dictionary_encode, optimize_chunk, OptimizedChunk, OptimizerOptions};
