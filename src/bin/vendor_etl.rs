use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use vendor_etl::{
    observability, open_store, run_ingestion, run_summary_report, EtlConfig, IngestionReport,
    ReportSummary, Result, StorageConfig,
};

fn parse_chunk_size(value: &str) -> std::result::Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|err| format!("invalid chunk size '{value}': {err}"))?;
    if parsed == 0 {
        return Err("chunk size must be greater than zero".into());
    }
    Ok(parsed)
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        log::error!("vendor-etl failed: {err}");
        eprintln!("error: {err}");
        process::exit(1);
    }
}

#[derive(Parser)]
#[command(
    name = "vendor-etl",
    version,
    about = "Chunked CSV ingestion and vendor sales summary reporting"
)]
struct Cli {
    /// JSON configuration file. Every field is optional.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Append log lines to this file instead of stderr.
    #[arg(long = "log-file", global = true, value_name = "FILE")]
    log_file: Option<PathBuf>,
    /// Override the log level (error, warn, info, debug, trace, off).
    #[arg(long = "log-level", global = true, value_name = "LEVEL")]
    log_level: Option<String>,
    /// Store relations as Arrow IPC files in this directory.
    #[arg(long = "store-dir", global = true, value_name = "DIR")]
    store_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load every input file into the relation store.
    Ingest(IngestArgs),
    /// Build the vendor sales summary from previously ingested relations.
    Report(ReportArgs),
    /// Ingest, then build the report.
    Run(RunArgs),
}

#[derive(Args, Clone)]
struct IngestArgs {
    /// Directory holding the input files.
    #[arg(long = "input-dir", value_name = "DIR")]
    input_dir: Option<PathBuf>,
    /// Maximum number of rows per chunk.
    #[arg(long = "chunk-size", value_name = "ROWS", value_parser = parse_chunk_size)]
    chunk_size: Option<usize>,
}

#[derive(Args, Clone)]
struct ReportArgs {
    /// Name of the summary relation to write.
    #[arg(long, value_name = "NAME")]
    output: Option<String>,
}

#[derive(Args, Clone)]
struct RunArgs {
    #[command(flatten)]
    ingest: IngestArgs,
    #[command(flatten)]
    report: ReportArgs,
}

impl Cli {
    /// Loads the configuration file (or defaults) and applies flag overrides.
    fn resolve_config(&self) -> Result<EtlConfig> {
        let mut config = match &self.config {
            Some(path) => EtlConfig::from_json_file(path)?,
            None => EtlConfig::default(),
        };
        if let Some(log_file) = &self.log_file {
            config.logging.log_file = Some(log_file.clone());
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(dir) = &self.store_dir {
            let atomic_replace = match &config.storage {
                StorageConfig::ArrowIpc { atomic_replace, .. } => *atomic_replace,
                StorageConfig::Memory => true,
            };
            config.storage = StorageConfig::ArrowIpc {
                dir: dir.clone(),
                atomic_replace,
            };
        }

        let (ingest, report) = match &self.command {
            Command::Ingest(ingest) => (Some(ingest), None),
            Command::Report(report) => (None, Some(report)),
            Command::Run(args) => (Some(&args.ingest), Some(&args.report)),
        };
        if let Some(ingest) = ingest {
            if let Some(dir) = &ingest.input_dir {
                config.input_dir = dir.clone();
            }
            if let Some(rows) = ingest.chunk_size {
                config.chunk_size_rows = rows;
            }
        }
        if let Some(output) = report.and_then(|r| r.output.as_ref()) {
            config.summary_relation = output.clone();
        }

        config.validate()?;
        Ok(config)
    }
}

#[derive(Serialize)]
struct RunOutput<'a> {
    ingestion: &'a IngestionReport,
    report: &'a ReportSummary,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.resolve_config()?;
    observability::init_logging(&config.logging)?;
    log::debug!("vendor-etl {} starting with {:?}", vendor_etl::VERSION, config);

    let mut store = open_store(&config.storage)?;
    match cli.command {
        Command::Ingest(_) => {
            let report = run_ingestion(&config.input_dir, store.as_mut(), &config.ingestion_options())?;
            print_json(&report)
        }
        Command::Report(_) => {
            let summary = run_summary_report(store.as_mut(), &config.report_options())?;
            print_json(&summary)
        }
        Command::Run(_) => {
            let ingestion = run_ingestion(&config.input_dir, store.as_mut(), &config.ingestion_options())?;
            let report = run_summary_report(store.as_mut(), &config.report_options())?;
            print_json(&RunOutput {
                ingestion: &ingestion,
                report: &report,
            })
        }
    }
}
