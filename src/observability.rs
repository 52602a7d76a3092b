// In: src/observability.rs

//! Logger setup and small formatting helpers shared by the jobs.

use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::sync::Once;
use std::time::Duration;

use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use log::LevelFilter;

use crate::config::LoggingConfig;
use crate::error::{EtlError, Result};

static INIT_LOGGER: Once = Once::new();

fn parse_level(level: &str) -> Result<LevelFilter> {
    level
        .parse::<LevelFilter>()
        .map_err(|_| EtlError::Config(format!("unknown log level '{}'", level)))
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new().append(true).create(true).open(path)?)
}

/// Installs the global logger: `<timestamp> - <LEVEL> - <message>` lines,
/// appended to `config.log_file` when set and written to stderr otherwise.
///
/// Only the first call installs a logger; later calls return `Ok(())`.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let level = parse_level(&config.level)?;
    if INIT_LOGGER.is_completed() {
        return Ok(());
    }
    let file = config.log_file.as_deref().map(open_log_file).transpose()?;

    INIT_LOGGER.call_once(|| {
        let mut builder = env_logger::Builder::new();

        builder.is_test(false);
        builder.filter_level(level);
        builder.format(|buf, record| {
            use std::io::Write;
            writeln!(buf, "{} - {} - {}", buf.timestamp_millis(), record.level(), record.args())
        });

        if let Some(file) = file {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }

        let _ = builder.try_init();
    });
    Ok(())
}

/// Bytes to mebibytes, the unit used in per-file log lines.
pub fn format_megabytes(bytes: usize) -> String {
    format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
}

pub fn format_minutes(elapsed: Duration) -> String {
    format!("{:.2} minutes", elapsed.as_secs_f64() / 60.0)
}

/// Renders the first `rows` rows of `batch` as a text table.
pub fn preview(batch: &RecordBatch, rows: usize) -> Result<String> {
    let head = batch.slice(0, rows.min(batch.num_rows()));
    Ok(pretty_format_batches(&[head])?.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Int32Array};
    use std::sync::Arc;

    #[test]
    fn test_formatting_helpers() {
        assert_eq!(format_megabytes(3 * 1024 * 1024 / 2), "1.50 MB");
        assert_eq!(format_minutes(Duration::from_secs(90)), "1.50 minutes");
    }

    #[test]
    fn test_unknown_level_is_rejected() {
        let config = LoggingConfig {
            level: "chatty".to_string(),
            log_file: None,
        };
        assert!(matches!(init_logging(&config), Err(EtlError::Config(_))));
    }

    #[test]
    fn test_init_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfig {
            level: "debug".to_string(),
            log_file: Some(dir.path().join("logs").join("etl.log")),
        };
        init_logging(&config).unwrap();
        init_logging(&config).unwrap();
    }

    #[test]
    fn test_preview_limits_rows() {
        let batch = RecordBatch::try_from_iter(vec![(
            "n",
            Arc::new(Int32Array::from(vec![1, 2, 3])) as ArrayRef,
        )])
        .unwrap();
        let text = preview(&batch, 2).unwrap();
        assert!(text.contains("| 2 |"));
        assert!(!text.contains("| 3 |"));
    }
}
