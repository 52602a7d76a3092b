// In: src/jobs/ingestion.rs

//! Loads every eligible file in a directory into the relation store.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::Result;
use crate::loader::{ChunkedLoader, LoaderOptions};
use crate::observability::{format_megabytes, format_minutes};
use crate::store::{validate_relation_name, write_relation, RelationStore};
use crate::types::{ColumnSummary, Relation};

#[derive(Debug, Clone, PartialEq)]
pub struct IngestionOptions {
    /// Extension of the files to ingest, without the leading dot. Matched case-insensitively.
    pub file_extension: String,
    pub loader: LoaderOptions,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            file_extension: "csv".to_string(),
            loader: LoaderOptions::default(),
        }
    }
}

/// One file that was loaded and stored.
#[derive(Debug, Clone, Serialize)]
pub struct IngestedRelation {
    pub name: String,
    pub path: PathBuf,
    pub rows: usize,
    pub columns: usize,
    /// Approximate in-memory footprint of the optimized relation.
    pub bytes: usize,
    pub chunks: usize,
    pub schema: Vec<ColumnSummary>,
}

/// One file that could not be loaded and was left out.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestionReport {
    pub relations: Vec<IngestedRelation>,
    pub skipped: Vec<SkippedFile>,
    pub elapsed: Duration,
}

/// Regular files in `dir` whose extension matches, sorted by file name.
pub fn discover_input_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let extension = extension.trim_start_matches('.');
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension));
        if matches && path.is_file() {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// The relation a file is stored as: its base name without the extension.
pub fn relation_name_for(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Runs the chunked loader over every eligible file in `input_dir` and
/// replaces the matching relation in `store`.
///
/// A file that fails to load, or whose name is not a valid relation name, is
/// logged and skipped. A storage failure stops the job and is returned.
pub fn run_ingestion(
    input_dir: &Path,
    store: &mut dyn RelationStore,
    options: &IngestionOptions,
) -> Result<IngestionReport> {
    let start = Instant::now();
    let loader = ChunkedLoader::new(options.loader.clone())?;

    let files = discover_input_files(input_dir, &options.file_extension).map_err(|e| {
        log::error!(
            "Cannot list input directory {} after {}: {}",
            input_dir.display(),
            format_minutes(start.elapsed()),
            e
        );
        e
    })?;
    log::info!(
        "Found {} .{} file(s) in {}, storing into {}",
        files.len(),
        options.file_extension,
        input_dir.display(),
        store.describe()
    );

    let mut report = IngestionReport::default();
    for path in files {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = match relation_name_for(&path) {
            Some(name) => match validate_relation_name(&name) {
                Ok(()) => name,
                Err(e) => {
                    log::error!("Skipping {}: {}", file_name, e);
                    report.skipped.push(SkippedFile {
                        path,
                        error: e.to_string(),
                    });
                    continue;
                }
            },
            None => {
                log::warn!("Skipping {}: no usable relation name", path.display());
                report.skipped.push(SkippedFile {
                    path,
                    error: "no usable relation name".to_string(),
                });
                continue;
            }
        };

        let loaded = match loader.load(&path) {
            Ok(loaded) => loaded,
            Err(e) if e.is_fatal() => {
                log::error!(
                    "Ingestion stopped after {}: {}",
                    format_minutes(start.elapsed()),
                    e
                );
                return Err(e);
            }
            Err(e) => {
                log::error!("Skipping {}: {}", file_name, e);
                report.skipped.push(SkippedFile {
                    path,
                    error: e.to_string(),
                });
                continue;
            }
        };

        let relation = Relation::new(name, loaded.batch);
        log::info!(
            "Ingesting {} => ({}, {}) , memory usage: {}",
            file_name,
            relation.num_rows(),
            relation.num_columns(),
            format_megabytes(relation.memory_size())
        );

        if let Err(e) = write_relation(store, &relation) {
            log::error!(
                "Ingestion stopped after {}: {}",
                format_minutes(start.elapsed()),
                e
            );
            return Err(e);
        }

        report.relations.push(IngestedRelation {
            name: relation.name.clone(),
            path,
            rows: relation.num_rows(),
            columns: relation.num_columns(),
            bytes: relation.memory_size(),
            chunks: loaded.chunk_count,
            schema: relation.column_summaries(),
        });
    }

    report.elapsed = start.elapsed();
    log::info!("{} Ingestion Completed {}", "-".repeat(50), "-".repeat(50));
    log::info!(
        "Total time taken : {} ({} stored, {} skipped)",
        format_minutes(report.elapsed),
        report.relations.len(),
        report.skipped.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discover_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["sales.csv", "b.CSV", "a.csv", "notes.txt", "csv", ".csv.bak"] {
            fs::write(dir.path().join(name), "x\n1\n").unwrap();
        }
        fs::create_dir(dir.path().join("nested.csv")).unwrap();

        let files = discover_input_files(dir.path(), ".csv").unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.csv", "b.CSV", "sales.csv"]);
    }

    #[test]
    fn test_relation_names_strip_the_extension() {
        assert_eq!(
            relation_name_for(Path::new("/data/purchase_prices.csv")).as_deref(),
            Some("purchase_prices")
        );
        assert_eq!(relation_name_for(Path::new("/data/sales.2024.csv")).as_deref(), Some("sales.2024"));
    }
}
