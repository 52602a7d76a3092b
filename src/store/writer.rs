// In: src/store/writer.rs

//! Persists a named in-memory relation, replacing any relation of that name.

use std::time::Instant;

use super::{validate_relation_name, RelationStore, WriteMode};
use crate::error::{EtlError, Result};
use crate::types::Relation;

/// Writes `relation` to `store` with replace semantics.
///
/// Every failure, including a rejected name or an I/O error inside the
/// backend, surfaces as `EtlError::StorageWrite`.
pub fn write_relation(store: &mut dyn RelationStore, relation: &Relation) -> Result<()> {
    let start = Instant::now();
    validate_relation_name(&relation.name)?;

    store
        .write_relation(&relation.name, &relation.batch, WriteMode::Replace)
        .map_err(|e| match e {
            EtlError::StorageWrite { .. } => e,
            other => EtlError::storage_write(&relation.name, other),
        })?;

    log::debug!(
        "Wrote relation '{}' ({} rows) in {:.2?}",
        relation.name,
        relation.num_rows(),
        start.elapsed()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use arrow::array::{ArrayRef, StringArray};
    use arrow::record_batch::RecordBatch;
    use std::sync::Arc;

    fn relation(name: &str, values: Vec<&str>) -> Relation {
        let batch = RecordBatch::try_from_iter(vec![(
            "v",
            Arc::new(StringArray::from(values)) as ArrayRef,
        )])
        .unwrap();
        Relation::new(name, batch)
    }

    /// A backend whose writes always fail with a non-storage error.
    struct BrokenStore;

    impl RelationStore for BrokenStore {
        fn write_relation(&mut self, _: &str, _: &RecordBatch, _: WriteMode) -> Result<()> {
            Err(EtlError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only",
            )))
        }
        fn read_relation(&self, name: &str) -> Result<RecordBatch> {
            Err(EtlError::RelationNotFound(name.to_string()))
        }
        fn drop_relation(&mut self, _: &str) -> Result<bool> {
            Ok(false)
        }
        fn contains(&self, _: &str) -> Result<bool> {
            Ok(false)
        }
        fn relation_names(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
        fn describe(&self) -> String {
            "broken".to_string()
        }
    }

    #[test]
    fn test_second_write_replaces_the_first() {
        let mut store = MemoryStore::new();
        write_relation(&mut store, &relation("t", vec!["a", "b"])).unwrap();
        write_relation(&mut store, &relation("t", vec!["c"])).unwrap();
        assert_eq!(store.read_relation("t").unwrap().num_rows(), 1);
    }

    #[test]
    fn test_bad_name_is_a_storage_write_error() {
        let mut store = MemoryStore::new();
        let err = write_relation(&mut store, &relation("a/b", vec!["x"])).unwrap_err();
        assert!(matches!(err, EtlError::StorageWrite { .. }));
    }

    #[test]
    fn test_backend_failures_become_storage_write_errors() {
        let err = write_relation(&mut BrokenStore, &relation("t", vec!["x"])).unwrap_err();
        match err {
            EtlError::StorageWrite { relation, message } => {
                assert_eq!(relation, "t");
                assert!(message.contains("read-only"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
