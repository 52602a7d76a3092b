//! Chunked, memory-bounded loading of delimited files into Arrow relations.
//!
//! A file is read as a lazy sequence of row-bounded chunks (`ChunkReader`).
//! Each chunk is optimized as soon as it is produced, so only optimized chunks
//! are retained while reading; the final concatenation materializes the whole
//! relation once.

use std::path::Path;
use std::time::Instant;

use arrow::record_batch::RecordBatch;
use arrow_schema::SchemaRef;

use crate::error::{EtlError, Result};
use crate::optimizer::{optimize_chunk, OptimizerOptions};

//==================================================================================
// 1. Module Declarations
//==================================================================================

pub mod chunk_reader;
mod reconcile;

pub use chunk_reader::ChunkReader;

//==================================================================================
// 2. Options
//==================================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct LoaderOptions {
    /// Upper bound on the number of rows held in a single chunk.
    pub chunk_size_rows: usize,
    pub delimiter: u8,
    pub has_header: bool,
    pub optimizer: OptimizerOptions,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            chunk_size_rows: 80_000,
            delimiter: b',',
            has_header: true,
            optimizer: OptimizerOptions::default(),
        }
    }
}

/// The result of loading one file.
#[derive(Debug, Clone)]
pub struct LoadedFile {
    pub batch: RecordBatch,
    pub chunk_count: usize,
}

//==================================================================================
// 3. ChunkedLoader
//==================================================================================

#[derive(Debug, Clone)]
pub struct ChunkedLoader {
    options: LoaderOptions,
}

impl ChunkedLoader {
    pub fn new(options: LoaderOptions) -> Result<Self> {
        if options.chunk_size_rows == 0 {
            return Err(EtlError::Config(
                "chunk_size_rows must be greater than zero".to_string(),
            ));
        }
        Ok(Self { options })
    }

    /// Infers the parse schema shared by every chunk of `path`.
    pub fn infer_schema(&self, path: &Path) -> Result<SchemaRef> {
        let format = chunk_reader::csv_format(self.options.delimiter, self.options.has_header);
        chunk_reader::infer_file_schema(path, &format)
    }

    /// Opens `path` as a lazy stream of raw (unoptimized) chunks.
    pub fn chunks(&self, path: &Path) -> Result<ChunkReader> {
        let format = chunk_reader::csv_format(self.options.delimiter, self.options.has_header);
        let schema = chunk_reader::infer_file_schema(path, &format)?;
        ChunkReader::open(path, schema, format, self.options.chunk_size_rows)
    }

    /// Reads, optimizes and concatenates every chunk of `path`.
    ///
    /// Any malformed row aborts the whole file; no partial relation is returned.
    pub fn load(&self, path: &Path) -> Result<LoadedFile> {
        let start = Instant::now();
        let mut reader = self.chunks(path)?;
        let parse_schema = reader.schema();

        let mut optimized = Vec::new();
        for chunk in reader.by_ref() {
            let chunk = chunk?;
            let rows = chunk.num_rows();
            let result = optimize_chunk(&chunk, &self.options.optimizer)?;
            log::debug!(
                "{}: chunk {} ({} rows) optimized to {} bytes",
                path.display(),
                optimized.len(),
                rows,
                result.batch.get_array_memory_size()
            );
            optimized.push(result.batch);
        }

        let chunk_count = reader.chunks_read();
        let batch = reconcile::concat_chunks(&parse_schema, &optimized)?;
        log::debug!(
            "{}: loaded {} rows in {} chunks ({:.2?})",
            path.display(),
            batch.num_rows(),
            chunk_count,
            start.elapsed()
        );
        Ok(LoadedFile { batch, chunk_count })
    }
}
