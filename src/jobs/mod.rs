//! The two batch jobs. Each takes the storage handle explicitly and runs to
//! completion or returns an error.

pub mod ingestion;
pub mod report;

pub use ingestion::{
    discover_input_files, run_ingestion, IngestedRelation, IngestionOptions, IngestionReport,
    SkippedFile,
};
pub use report::{run_summary_report, ReportOptions, ReportSummary};

#[cfg(test)]
mod tests;
