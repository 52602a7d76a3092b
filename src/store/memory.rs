use std::collections::BTreeMap;

use arrow::record_batch::RecordBatch;

use super::{validate_relation_name, RelationStore, WriteMode};
use crate::error::{EtlError, Result};

/// Keeps relations in process memory for the lifetime of the store.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    relations: BTreeMap<String, RecordBatch>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RelationStore for MemoryStore {
    fn write_relation(&mut self, name: &str, batch: &RecordBatch, mode: WriteMode) -> Result<()> {
        validate_relation_name(name)?;
        if mode == WriteMode::ErrorIfExists && self.relations.contains_key(name) {
            return Err(EtlError::storage_write(name, "relation already exists"));
        }
        // Record batches share their buffers, so this clone is cheap.
        self.relations.insert(name.to_string(), batch.clone());
        Ok(())
    }

    fn read_relation(&self, name: &str) -> Result<RecordBatch> {
        self.relations
            .get(name)
            .cloned()
            .ok_or_else(|| EtlError::RelationNotFound(name.to_string()))
    }

    fn drop_relation(&mut self, name: &str) -> Result<bool> {
        Ok(self.relations.remove(name).is_some())
    }

    fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.relations.contains_key(name))
    }

    fn relation_names(&self) -> Result<Vec<String>> {
        Ok(self.relations.keys().cloned().collect())
    }

    fn describe(&self) -> String {
        format!("memory ({} relations)", self.relations.len())
    }
}
