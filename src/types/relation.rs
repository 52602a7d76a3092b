use arrow::record_batch::RecordBatch;
use arrow_schema::DataType;
use serde::Serialize;

use super::column_encoding::ColumnEncoding;

/// A named, fully materialized relation.
///
/// Relations are always handed to the store whole; there is no partial update path.
#[derive(Debug, Clone)]
pub struct Relation {
    pub name: String,
    pub batch: RecordBatch,
}

impl Relation {
    pub fn new(name: impl Into<String>, batch: RecordBatch) -> Self {
        Self {
            name: name.into(),
            batch,
        }
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn num_columns(&self) -> usize {
        self.batch.num_columns()
    }

    /// Approximate deep memory footprint of all column buffers, in bytes.
    pub fn memory_size(&self) -> usize {
        self.batch.get_array_memory_size()
    }

    pub fn column_summaries(&self) -> Vec<ColumnSummary> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|field| ColumnSummary {
                name: field.name().clone(),
                data_type: field.data_type().clone(),
                encoding: ColumnEncoding::from_arrow_type(field.data_type()),
            })
            .collect()
    }
}

/// Name and physical type of a stored column, as reported by the jobs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    pub data_type: DataType,
    /// The narrowed representation the column ended up with, if any.
    pub encoding: ColumnEncoding,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::column_encoding::Width;
    use arrow::array::{Int8Array, StringArray};
    use arrow_schema::{Field, Schema};
    use std::sync::Arc;

    #[test]
    fn test_shape_and_summaries() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int8, false),
            Field::new("name", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int8Array::from(vec![1, 2])),
                Arc::new(StringArray::from(vec![Some("a"), None])),
            ],
        )
        .unwrap();
        let relation = Relation::new("t", batch);

        assert_eq!(relation.num_rows(), 2);
        assert_eq!(relation.num_columns(), 2);
        assert!(relation.memory_size() > 0);
        let summaries = relation.column_summaries();
        assert_eq!(summaries[0].name, "id");
        assert_eq!(summaries[1].data_type, DataType::Utf8);
        assert_eq!(summaries[0].encoding, ColumnEncoding::Integer(Width::W8));
        assert_eq!(summaries[1].encoding, ColumnEncoding::Unchanged);
    }
}
