// In: src/summary/join.rs

//! Hash equi-join of two in-memory relations.
//!
//! The right side is built into a hash table; the left side is probed row by
//! row, so output rows follow left-row order, and for each left row its
//! matches follow right-row order. A null or NaN in any key column never matches.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, UInt32Array};
use arrow::compute::take;
use arrow::record_batch::RecordBatch;
use arrow_schema::{Field, Schema};
use hashbrown::HashMap;

use super::group_by::Aliased;
use super::keys::{column_by_name, ensure_joinable, row_key, KeyColumn, KeyValue};
use crate::error::{EtlError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    /// Keep only left rows with at least one match.
    Inner,
    /// Keep every left row; unmatched rows get null right-side columns.
    Left,
}

fn row_index(relation: &str, row: usize) -> Result<u32> {
    u32::try_from(row)
        .map_err(|_| EtlError::Aggregation(format!("relation '{}' has too many rows", relation)))
}

/// Joins `left` and `right` on the `on` pairs of `(left column, right column)`.
///
/// The output holds every left column unchanged, followed by the
/// `right_projection` columns under their aliases.
pub fn hash_join(
    left_name: &str,
    left: &RecordBatch,
    right_name: &str,
    right: &RecordBatch,
    on: &[(&str, &str)],
    join_type: JoinType,
    right_projection: &[Aliased<'_>],
) -> Result<RecordBatch> {
    let left_keys = on
        .iter()
        .map(|(l, _)| KeyColumn::try_new(left_name, left, l))
        .collect::<Result<Vec<_>>>()?;
    let right_keys = on
        .iter()
        .map(|(_, r)| KeyColumn::try_new(right_name, right, r))
        .collect::<Result<Vec<_>>>()?;
    ensure_joinable(&left_keys, &right_keys)?;

    let left_schema = left.schema();
    let mut projected = Vec::with_capacity(right_projection.len());
    for (source, alias) in right_projection {
        if left_schema.index_of(alias).is_ok() {
            return Err(EtlError::SchemaMismatch(format!(
                "joined column '{}' from '{}' collides with a column of '{}'",
                alias, right_name, left_name
            )));
        }
        projected.push((column_by_name(right_name, right, source)?, *alias));
    }

    // Build.
    let mut table: HashMap<Vec<KeyValue>, Vec<u32>> = HashMap::new();
    for row in 0..right.num_rows() {
        let key = row_key(&right_keys, row);
        if key.iter().any(KeyValue::never_equal) {
            continue;
        }
        table.entry(key).or_default().push(row_index(right_name, row)?);
    }

    // Probe.
    let mut left_indices: Vec<u32> = Vec::with_capacity(left.num_rows());
    let mut right_indices: Vec<Option<u32>> = Vec::with_capacity(left.num_rows());
    for row in 0..left.num_rows() {
        let key = row_key(&left_keys, row);
        let matches = if key.iter().any(KeyValue::never_equal) {
            None
        } else {
            table.get(&key)
        };
        let left_row = row_index(left_name, row)?;
        match matches {
            Some(rows) => {
                for right_row in rows {
                    left_indices.push(left_row);
                    right_indices.push(Some(*right_row));
                }
            }
            None if join_type == JoinType::Left => {
                left_indices.push(left_row);
                right_indices.push(None);
            }
            None => {}
        }
    }

    log::debug!(
        "{:?} join '{}' ({} rows) with '{}' ({} rows): {} output rows",
        join_type,
        left_name,
        left.num_rows(),
        right_name,
        right.num_rows(),
        left_indices.len()
    );

    let left_indices = UInt32Array::from(left_indices);
    let right_indices = UInt32Array::from(right_indices);

    let mut fields: Vec<Field> = Vec::with_capacity(left.num_columns() + projected.len());
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(left.num_columns() + projected.len());
    for (field, column) in left_schema.fields().iter().zip(left.columns()) {
        fields.push(field.as_ref().clone());
        columns.push(take(column.as_ref(), &left_indices, None)?);
    }
    for (column, alias) in projected {
        let gathered = take(column.as_ref(), &right_indices, None)?;
        let nullable = join_type == JoinType::Left || gathered.null_count() > 0 || column.null_count() > 0;
        fields.push(Field::new(alias, gathered.data_type().clone(), nullable));
        columns.push(gathered);
    }

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

/// Selects `columns` from `batch` in the given order, renaming each to its alias.
pub fn project(relation: &str, batch: &RecordBatch, columns: &[Aliased<'_>]) -> Result<RecordBatch> {
    let schema = batch.schema();
    let mut fields = Vec::with_capacity(columns.len());
    let mut arrays = Vec::with_capacity(columns.len());
    for (source, alias) in columns {
        let array = column_by_name(relation, batch, source)?;
        let field = schema.field_with_name(source)?;
        fields.push(Field::new(*alias, field.data_type().clone(), field.is_nullable()));
        arrays.push(Arc::clone(array));
    }
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}
