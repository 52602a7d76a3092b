// In: src/store/ipc.rs

//! An on-disk relation store: one Arrow IPC file per relation.
//!
//! Layout: `<dir>/<name>.arrow`. Replacement either drops the old file and
//! writes the new one in place (a crash in between leaves the relation
//! missing), or writes `<dir>/.<name>.arrow.tmp` and renames it over the
//! target, which is atomic on POSIX filesystems.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::compute::concat_batches;
use arrow::ipc::reader::FileReader;
use arrow::ipc::writer::FileWriter;
use arrow::record_batch::RecordBatch;
use arrow_schema::{DataType, Field, Schema};

use super::{validate_relation_name, RelationStore, WriteMode};
use crate::error::{EtlError, Result};

/// File extension used for stored relations.
pub const IPC_EXTENSION: &str = "arrow";

#[derive(Debug, Clone)]
pub struct ArrowIpcStore {
    dir: PathBuf,
    atomic_replace: bool,
}

impl ArrowIpcStore {
    /// Opens (and creates, if needed) the store directory.
    pub fn open(dir: &Path, atomic_replace: bool) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            atomic_replace,
        })
    }

    pub fn relation_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", name, IPC_EXTENSION))
    }

    fn temp_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!(".{}.{}.tmp", name, IPC_EXTENSION))
    }

    fn write_file(path: &Path, batch: &RecordBatch) -> Result<()> {
        let batch = with_unique_dictionary_ids(batch)?;
        let file = File::create(path)?;
        let mut writer = FileWriter::try_new(BufWriter::new(file), &batch.schema())?;
        writer.write(&batch)?;
        writer.finish()?;
        let mut out = writer.into_inner()?;
        out.flush()?;
        out.get_ref().sync_all()?;
        Ok(())
    }

    fn replace_in_place(&self, name: &str, batch: &RecordBatch) -> Result<()> {
        let target = self.relation_path(name);
        if target.exists() {
            fs::remove_file(&target)?;
        }
        Self::write_file(&target, batch)
    }

    fn replace_atomically(&self, name: &str, batch: &RecordBatch) -> Result<()> {
        let temp = self.temp_path(name);
        if let Err(e) = Self::write_file(&temp, batch) {
            let _ = fs::remove_file(&temp);
            return Err(e);
        }
        fs::rename(&temp, self.relation_path(name))?;
        Ok(())
    }
}

/// The IPC file format tracks dictionaries by id; give every dictionary
/// column its own id so sibling dictionary columns do not collide.
fn with_unique_dictionary_ids(batch: &RecordBatch) -> Result<RecordBatch> {
    let schema = batch.schema();
    if !schema
        .fields()
        .iter()
        .any(|f| matches!(f.data_type(), DataType::Dictionary(_, _)))
    {
        return Ok(batch.clone());
    }
    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .enumerate()
        .map(|(idx, field)| match field.data_type() {
            DataType::Dictionary(_, _) => Field::new_dict(
                field.name(),
                field.data_type().clone(),
                field.is_nullable(),
                idx as i64,
                false,
            )
            .with_metadata(field.metadata().clone()),
            _ => field.as_ref().clone(),
        })
        .collect();
    let schema = Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()));
    Ok(RecordBatch::try_new(schema, batch.columns().to_vec())?)
}

impl RelationStore for ArrowIpcStore {
    fn write_relation(&mut self, name: &str, batch: &RecordBatch, mode: WriteMode) -> Result<()> {
        validate_relation_name(name)?;
        let exists = self.relation_path(name).exists();
        if exists && mode == WriteMode::ErrorIfExists {
            return Err(EtlError::storage_write(name, "relation already exists"));
        }

        let result = if self.atomic_replace {
            self.replace_atomically(name, batch)
        } else {
            self.replace_in_place(name, batch)
        };
        result.map_err(|e| match e {
            EtlError::StorageWrite { .. } => e,
            other => EtlError::storage_write(name, other),
        })
    }

    fn read_relation(&self, name: &str) -> Result<RecordBatch> {
        let path = self.relation_path(name);
        if !path.is_file() {
            return Err(EtlError::RelationNotFound(name.to_string()));
        }
        let read = || -> Result<RecordBatch> {
            let reader = FileReader::try_new(BufReader::new(File::open(&path)?), None)?;
            let schema = reader.schema();
            let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(concat_batches(&schema, &batches)?)
        };
        read().map_err(|e| EtlError::storage_read(name, e))
    }

    fn drop_relation(&mut self, name: &str) -> Result<bool> {
        let path = self.relation_path(name);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).map_err(|e| EtlError::storage_write(name, e))?;
        Ok(true)
    }

    fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.relation_path(name).is_file())
    }

    fn relation_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(IPC_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if !stem.starts_with('.') {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn describe(&self) -> String {
        format!(
            "arrow-ipc at {} ({})",
            self.dir.display(),
            if self.atomic_replace {
                "atomic replace"
            } else {
                "drop and recreate"
            }
        )
    }
}
