// In: src/jobs/report.rs

//! Builds, cleans and stores the vendor sales summary.

use std::time::{Duration, Instant};

use arrow::record_batch::RecordBatch;
use serde::Serialize;

use crate::error::Result;
use crate::observability::{format_minutes, preview};
use crate::store::{write_relation, RelationStore};
use crate::summary::{clean_summary, SummaryAggregator};
use crate::types::columns::SUMMARY_RELATION;
use crate::types::{ColumnSummary, Relation};

/// Rows of each intermediate result echoed to the log.
const PREVIEW_ROWS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportOptions {
    /// Name of the relation the cleaned summary replaces.
    pub output_relation: String,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            output_relation: SUMMARY_RELATION.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub relation: String,
    pub rows: usize,
    pub columns: usize,
    pub schema: Vec<ColumnSummary>,
    pub elapsed: Duration,
}

fn log_preview(batch: &RecordBatch) {
    if !log::log_enabled!(log::Level::Info) {
        return;
    }
    match preview(batch, PREVIEW_ROWS) {
        Ok(table) => log::info!("\n{}", table),
        Err(e) => log::warn!("Could not render preview: {}", e),
    }
}

/// Aggregates the base relations in `store`, cleans the result, and stores
/// it as `options.output_relation`.
///
/// Any failure ends the job; nothing is written unless every step succeeded.
pub fn run_summary_report(store: &mut dyn RelationStore, options: &ReportOptions) -> Result<ReportSummary> {
    let start = Instant::now();
    build_and_store(store, options).map_err(|e| {
        log::error!(
            "Vendor summary failed after {}: {}",
            format_minutes(start.elapsed()),
            e
        );
        e
    })
}

fn build_and_store(store: &mut dyn RelationStore, options: &ReportOptions) -> Result<ReportSummary> {
    let job_start = Instant::now();

    let step = Instant::now();
    log::info!("Creating Vendor Summary Table......");
    let aggregated = SummaryAggregator::new(&*store).aggregate()?;
    log::info!("Created Vendor Summary Table in {}.", format_minutes(step.elapsed()));
    log_preview(&aggregated);

    let step = Instant::now();
    log::info!("Cleaning Data......");
    let cleaned = clean_summary(&aggregated)?;
    log::info!("Cleaned data in {}.", format_minutes(step.elapsed()));
    log_preview(&cleaned);

    let step = Instant::now();
    log::info!("Storing '{}'......", options.output_relation);
    let relation = Relation::new(options.output_relation.clone(), cleaned);
    write_relation(store, &relation)?;
    log::info!("Stored {} rows in {}.", relation.num_rows(), format_minutes(step.elapsed()));
    log::info!("Vendor summary report completed.");

    Ok(ReportSummary {
        relation: relation.name.clone(),
        rows: relation.num_rows(),
        columns: relation.num_columns(),
        schema: relation.column_summaries(),
        elapsed: job_start.elapsed(),
    })
}
