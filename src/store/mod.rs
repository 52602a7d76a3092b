// ====================================================================================
// ARCHITECTURAL OVERVIEW: The Relation Store
// ====================================================================================
//
// Every job talks to storage through `&mut dyn RelationStore`. The handle is
// opened by the caller (`open_store`), passed into each job explicitly, and
// dropped by the caller; there is no process-wide connection.
//
//   [IngestionJob] --write_relation(name, batch, Replace)--> [RelationStore]
//   [ReportJob]    --read_relation(name)------------------->  |-- MemoryStore
//                  --write_relation(summary, Replace)------>  `-- ArrowIpcStore
//
// Relations are always replaced whole. There is no incremental update path.
// ====================================================================================

use arrow::record_batch::RecordBatch;

use crate::config::StorageConfig;
use crate::error::{EtlError, Result};

pub mod ipc;
pub mod memory;
pub mod writer;

pub use ipc::ArrowIpcStore;
pub use memory::MemoryStore;
pub use writer::write_relation;

/// What to do when a relation with the target name already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Drop the existing relation and store the new one in its place.
    Replace,
    /// Fail with `StorageWrite` instead of touching the existing relation.
    ErrorIfExists,
}

/// A relational store addressed by relation name.
pub trait RelationStore {
    /// Persists `batch` under `name`.
    fn write_relation(&mut self, name: &str, batch: &RecordBatch, mode: WriteMode) -> Result<()>;

    /// Reads the whole relation. A missing name is `RelationNotFound`.
    fn read_relation(&self, name: &str) -> Result<RecordBatch>;

    /// Removes the relation, returning whether it existed.
    fn drop_relation(&mut self, name: &str) -> Result<bool>;

    fn contains(&self, name: &str) -> Result<bool>;

    /// Names of all stored relations, sorted.
    fn relation_names(&self) -> Result<Vec<String>>;

    /// Short human-readable description used in log lines.
    fn describe(&self) -> String;
}

/// Relation names become file names in the on-disk backend, so they must be
/// non-empty and free of path separators.
pub fn validate_relation_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(EtlError::storage_write(name, "relation name must not be empty"));
    }
    if name.starts_with('.') || name.contains(['/', '\\']) || name.contains('\0') {
        return Err(EtlError::storage_write(
            name,
            "relation name must not start with '.' or contain path separators",
        ));
    }
    Ok(())
}

/// Opens the configured backend.
pub fn open_store(config: &StorageConfig) -> Result<Box<dyn RelationStore>> {
    let store: Box<dyn RelationStore> = match config {
        StorageConfig::Memory => Box::new(MemoryStore::new()),
        StorageConfig::ArrowIpc {
            dir,
            atomic_replace,
        } => Box::new(ArrowIpcStore::open(dir, *atomic_replace)?),
    };
    log::info!("Opened relation store: {}", store.describe());
    Ok(store)
}
