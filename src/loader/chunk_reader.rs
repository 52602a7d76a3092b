// In: src/loader/chunk_reader.rs

//! A lazy, finite, single-pass stream of row-bounded chunks from one CSV file.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::csv::reader::{Format, Reader, ReaderBuilder};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use arrow_schema::{DataType, Field, Schema, SchemaRef};

use crate::error::{EtlError, Result};

/// Builds the CSV dialect used for both inference and reading.
///
/// Quoted fields may contain the delimiter, doubled quotes and line breaks.
pub(crate) fn csv_format(delimiter: u8, has_header: bool) -> Format {
    Format::default()
        .with_header(has_header)
        .with_delimiter(delimiter)
        .with_quote(b'"')
}

/// Infers one parse schema for the whole file by streaming it once.
///
/// Temporal types are kept as text so date-like columns flow through the
/// categorical path like any other string.
pub(crate) fn infer_file_schema(path: &Path, format: &Format) -> Result<SchemaRef> {
    let mut file = File::open(path)?;
    let (schema, records) = format
        .infer_schema(&mut file, None)
        .map_err(|e| classify_read_error(path, e))?;
    log::debug!(
        "inferred schema for {} from {} records",
        path.display(),
        records
    );

    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .map(|field| match field.data_type() {
            DataType::Date32
            | DataType::Date64
            | DataType::Timestamp(_, _)
            | DataType::Time32(_)
            | DataType::Time64(_)
            | DataType::Null => field.as_ref().clone().with_data_type(DataType::Utf8),
            _ => field.as_ref().clone(),
        })
        .collect();
    Ok(Arc::new(Schema::new(fields)))
}

/// Maps tokenizer and cell-parsing failures to `MalformedRecord`; anything
/// else keeps its original classification.
pub(crate) fn classify_read_error(path: &Path, err: ArrowError) -> EtlError {
    match err {
        ArrowError::CsvError(message) | ArrowError::ParseError(message) => {
            EtlError::MalformedRecord {
                path: path.to_path_buf(),
                message,
            }
        }
        ArrowError::IoError(_, io) => EtlError::Io(io),
        other => EtlError::Arrow(other),
    }
}

/// Iterator over the chunks of a single file. Every chunk holds exactly
/// `chunk_size_rows` rows except possibly the last one.
pub struct ChunkReader {
    path: PathBuf,
    schema: SchemaRef,
    reader: Reader<File>,
    chunks_read: usize,
    failed: bool,
}

impl ChunkReader {
    pub(crate) fn open(
        path: &Path,
        schema: SchemaRef,
        format: Format,
        chunk_size_rows: usize,
    ) -> Result<Self> {
        let file = File::open(path)?;
        let reader = ReaderBuilder::new(Arc::clone(&schema))
            .with_format(format)
            .with_batch_size(chunk_size_rows)
            .build(file)
            .map_err(|e| classify_read_error(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            schema,
            reader,
            chunks_read: 0,
            failed: false,
        })
    }

    /// The parse schema shared by every chunk.
    pub fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    pub fn chunks_read(&self) -> usize {
        self.chunks_read
    }
}

impl Iterator for ChunkReader {
    type Item = Result<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        // A tokenizer error leaves the reader mid-record; stop instead of resyncing.
        if self.failed {
            return None;
        }
        match self.reader.next()? {
            Ok(batch) => {
                self.chunks_read += 1;
                Some(Ok(batch))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(classify_read_error(&self.path, e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(contents: &str) -> NamedTempFile {
        let mut tmp = NamedTempFile::new().expect("create tmp");
        write!(tmp, "{}", contents).unwrap();
        tmp
    }

    fn open(tmp: &NamedTempFile, chunk_size_rows: usize) -> ChunkReader {
        let format = csv_format(b',', true);
        let schema = infer_file_schema(tmp.path(), &format).unwrap();
        ChunkReader::open(tmp.path(), schema, format, chunk_size_rows).unwrap()
    }

    #[test]
    fn test_chunks_are_row_bounded() {
        let mut contents = String::from("id,name\n");
        for i in 0..7 {
            contents.push_str(&format!("{},n{}\n", i, i));
        }
        let tmp = write_csv(&contents);
        let mut reader = open(&tmp, 3);

        let sizes: Vec<usize> = reader.by_ref().map(|c| c.unwrap().num_rows()).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
        assert_eq!(reader.chunks_read(), 3);
    }

    #[test]
    fn test_quoted_fields_with_embedded_delimiters() {
        let tmp = write_csv("id,desc\n1,\"a, b\"\n2,\"say \"\"hi\"\"\"\n3,\"two\nlines\"\n");
        let mut reader = open(&tmp, 10);
        let batch = reader.next().unwrap().unwrap();
        let desc = batch
            .column(1)
            .as_any()
            .downcast_ref::<arrow::array::StringArray>()
            .unwrap();
        assert_eq!(desc.value(0), "a, b");
        assert_eq!(desc.value(1), "say \"hi\"");
        assert_eq!(desc.value(2), "two\nlines");
    }

    #[test]
    fn test_dates_are_inferred_as_text() {
        let tmp = write_csv("d,n\n2024-01-01,1\n2024-01-02,2\n");
        let reader = open(&tmp, 10);
        assert_eq!(reader.schema().field(0).data_type(), &DataType::Utf8);
        assert_eq!(reader.schema().field(1).data_type(), &DataType::Int64);
    }

    #[test]
    fn test_ragged_row_is_malformed() {
        let tmp = write_csv("a,b\n1,2\n3,4,5\n6,7\n");
        let format = csv_format(b',', true);
        let result = infer_file_schema(tmp.path(), &format).and_then(|schema| {
            ChunkReader::open(tmp.path(), schema, format, 10)?.collect::<Result<Vec<_>>>()
        });
        assert!(matches!(result, Err(EtlError::MalformedRecord { .. })));
    }
}
