// In: src/summary/group_by.rs

//! In-memory hash group-by with `SUM` measures.
//!
//! Groups are emitted in order of their first row. Null key values are equal
//! to each other, so all rows with a null key share one group.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, Float64Array, Int64Array, UInt32Array};
use arrow::compute::{cast, take};
use arrow::datatypes::{Float64Type, Int64Type};
use arrow::record_batch::RecordBatch;
use arrow_schema::{DataType, Field, Schema};
use hashbrown::HashMap;

use super::keys::{column_by_name, is_float, is_integer, is_text, row_key, strict_cast, KeyColumn, KeyValue};
use crate::error::{EtlError, Result};

/// A source column and the name it takes in the output.
pub type Aliased<'a> = (&'a str, &'a str);

//==================================================================================
// 1. Measures
//==================================================================================

enum Measure {
    Int(Int64Array),
    Float(Float64Array),
    /// A column with no values at all (a `Null` column, or text that is entirely null).
    Empty,
}

impl Measure {
    fn try_new(relation: &str, batch: &RecordBatch, column: &str) -> Result<Self> {
        let array = column_by_name(relation, batch, column)?;
        let data_type = array.data_type();
        if is_integer(data_type) {
            let widened = strict_cast(array.as_ref(), &DataType::Int64).map_err(|e| {
                EtlError::SchemaMismatch(format!(
                    "measure '{}' of relation '{}' does not fit in Int64: {}",
                    column, relation, e
                ))
            })?;
            return Ok(Measure::Int(widened.as_primitive::<Int64Type>().clone()));
        }
        if is_float(data_type) {
            let widened = cast(array.as_ref(), &DataType::Float64)?;
            return Ok(Measure::Float(widened.as_primitive::<Float64Type>().clone()));
        }
        if data_type == &DataType::Null || (is_text(data_type) && array.null_count() == array.len()) {
            return Ok(Measure::Empty);
        }
        Err(EtlError::SchemaMismatch(format!(
            "measure '{}' of relation '{}' has non-numeric type {}",
            column, relation, data_type
        )))
    }

    fn accumulator(&self) -> Accumulator {
        match self {
            Measure::Int(_) => Accumulator::Int(Vec::new()),
            Measure::Float(_) | Measure::Empty => Accumulator::Float(Vec::new()),
        }
    }
}

/// Per-group running sums. `None` means no non-null input has been seen yet.
enum Accumulator {
    Int(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
}

impl Accumulator {
    fn push_group(&mut self) {
        match self {
            Accumulator::Int(sums) => sums.push(None),
            Accumulator::Float(sums) => sums.push(None),
        }
    }

    fn update(&mut self, measure: &Measure, group: usize, row: usize, alias: &str) -> Result<()> {
        match (self, measure) {
            (Accumulator::Int(sums), Measure::Int(values)) if values.is_valid(row) => {
                let value = values.value(row);
                sums[group] = Some(match sums[group] {
                    None => value,
                    Some(acc) => acc.checked_add(value).ok_or_else(|| {
                        EtlError::Aggregation(format!("integer overflow summing '{}'", alias))
                    })?,
                });
            }
            (Accumulator::Float(sums), Measure::Float(values)) if values.is_valid(row) => {
                let value = values.value(row);
                sums[group] = Some(sums[group].map_or(value, |acc| acc + value));
            }
            _ => {}
        }
        Ok(())
    }

    fn finish(self) -> ArrayRef {
        match self {
            Accumulator::Int(sums) => Arc::new(Int64Array::from(sums)),
            Accumulator::Float(sums) => Arc::new(Float64Array::from(sums)),
        }
    }
}

//==================================================================================
// 2. Group-by
//==================================================================================

/// Groups `batch` by the `group_by` columns and sums each `sums` column per group.
///
/// Output columns are the group keys (renamed to their aliases, in their
/// source type with dictionaries decoded to `Utf8`) followed by the sums
/// (`Int64` for integer measures, `Float64` otherwise).
pub fn group_sum(
    relation: &str,
    batch: &RecordBatch,
    group_by: &[Aliased<'_>],
    sums: &[Aliased<'_>],
) -> Result<RecordBatch> {
    let keys = group_by
        .iter()
        .map(|(source, _)| KeyColumn::try_new(relation, batch, source))
        .collect::<Result<Vec<_>>>()?;
    let measures = sums
        .iter()
        .map(|(source, _)| Measure::try_new(relation, batch, source))
        .collect::<Result<Vec<_>>>()?;
    let mut accumulators: Vec<Accumulator> = measures.iter().map(Measure::accumulator).collect();

    let mut groups: HashMap<Vec<KeyValue>, usize> = HashMap::new();
    let mut first_rows: Vec<u32> = Vec::new();

    for row in 0..batch.num_rows() {
        let key = row_key(&keys, row);
        let group = match groups.get(&key) {
            Some(group) => *group,
            None => {
                let group = first_rows.len();
                let first_row = u32::try_from(row).map_err(|_| {
                    EtlError::Aggregation(format!("relation '{}' has too many rows", relation))
                })?;
                groups.insert(key, group);
                first_rows.push(first_row);
                accumulators.iter_mut().for_each(Accumulator::push_group);
                group
            }
        };
        for ((acc, measure), (_, alias)) in accumulators.iter_mut().zip(&measures).zip(sums) {
            acc.update(measure, group, row, alias)?;
        }
    }

    log::debug!(
        "group-by over '{}': {} rows -> {} groups",
        relation,
        batch.num_rows(),
        first_rows.len()
    );

    let indices = UInt32Array::from(first_rows);
    let mut fields = Vec::with_capacity(group_by.len() + sums.len());
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(group_by.len() + sums.len());

    for (key, (_, alias)) in keys.iter().zip(group_by) {
        let source = key.source();
        let plain = match source.data_type() {
            DataType::Dictionary(_, value) => cast(source.as_ref(), value)?,
            _ => Arc::clone(source),
        };
        let column = take(plain.as_ref(), &indices, None)?;
        fields.push(Field::new(*alias, column.data_type().clone(), column.null_count() > 0));
        columns.push(column);
    }
    for (acc, (_, alias)) in accumulators.into_iter().zip(sums) {
        let column = acc.finish();
        fields.push(Field::new(*alias, column.data_type().clone(), true));
        columns.push(column);
    }

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int16Array, Int8Array, StringArray};
    use crate::optimizer::dictionary_encode;

    fn batch(columns: Vec<(&str, ArrayRef)>) -> RecordBatch {
        RecordBatch::try_from_iter(columns).unwrap()
    }

    #[test]
    fn test_groups_in_first_appearance_order() {
        let b = batch(vec![
            ("k", Arc::new(StringArray::from(vec!["b", "a", "b", "c", "a"])) as ArrayRef),
            ("q", Arc::new(Int8Array::from(vec![1, 2, 3, 4, 5])) as ArrayRef),
            ("d", Arc::new(Float64Array::from(vec![0.5, 1.0, 1.5, 2.0, 2.5])) as ArrayRef),
        ]);
        let out = group_sum("t", &b, &[("k", "key")], &[("q", "total_q"), ("d", "total_d")]).unwrap();

        assert_eq!(out.schema().field(0).name(), "key");
        assert_eq!(
            out.column(0).as_string::<i32>(),
            &StringArray::from(vec!["b", "a", "c"])
        );
        assert_eq!(out.column(1).as_ref(), &Int64Array::from(vec![4, 7, 4]) as &dyn Array);
        assert_eq!(
            out.column(2).as_ref(),
            &Float64Array::from(vec![2.0, 3.5, 2.0]) as &dyn Array
        );
    }

    #[test]
    fn test_null_keys_form_one_group_and_all_null_sums_are_null() {
        let b = batch(vec![
            ("k", Arc::new(Int16Array::from(vec![None, Some(1), None])) as ArrayRef),
            ("v", Arc::new(Float64Array::from(vec![None, Some(2.0), None])) as ArrayRef),
        ]);
        let out = group_sum("t", &b, &[("k", "k")], &[("v", "v")]).unwrap();

        assert_eq!(out.num_rows(), 2);
        assert_eq!(out.column(0).data_type(), &DataType::Int16);
        assert!(out.column(0).is_null(0));
        assert!(out.column(1).is_null(0));
        assert_eq!(out.column(1).as_primitive::<Float64Type>().value(1), 2.0);
    }

    #[test]
    fn test_dictionary_keys_are_decoded() {
        let text = StringArray::from(vec!["x", "x", "y"]);
        let b = batch(vec![
            ("k", dictionary_encode(&text).unwrap().0),
            ("v", Arc::new(Int8Array::from(vec![1, 1, 1])) as ArrayRef),
        ]);
        let out = group_sum("t", &b, &[("k", "k")], &[("v", "n")]).unwrap();
        assert_eq!(out.column(0).data_type(), &DataType::Utf8);
        assert_eq!(out.column(1).as_ref(), &Int64Array::from(vec![2, 1]) as &dyn Array);
    }

    #[test]
    fn test_integer_overflow_is_an_aggregation_error() {
        let b = batch(vec![
            ("k", Arc::new(Int8Array::from(vec![1, 1])) as ArrayRef),
            ("v", Arc::new(Int64Array::from(vec![i64::MAX, 1])) as ArrayRef),
        ]);
        let err = group_sum("t", &b, &[("k", "k")], &[("v", "v")]).unwrap_err();
        assert!(matches!(err, EtlError::Aggregation(_)));
    }

    #[test]
    fn test_text_measure_and_missing_column_are_mismatches() {
        let b = batch(vec![
            ("k", Arc::new(Int8Array::from(vec![1])) as ArrayRef),
            ("s", Arc::new(StringArray::from(vec!["12"])) as ArrayRef),
        ]);
        assert!(matches!(
            group_sum("t", &b, &[("k", "k")], &[("s", "s")]),
            Err(EtlError::SchemaMismatch(_))
        ));
        assert!(matches!(
            group_sum("t", &b, &[("nope", "k")], &[]),
            Err(EtlError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_empty_input_keeps_the_output_schema() {
        let b = batch(vec![
            ("k", Arc::new(StringArray::from(Vec::<&str>::new())) as ArrayRef),
            ("v", Arc::new(Int8Array::from(Vec::<i8>::new())) as ArrayRef),
        ]);
        let out = group_sum("t", &b, &[("k", "k")], &[("v", "total")]).unwrap();
        assert_eq!(out.num_rows(), 0);
        assert_eq!(out.schema().field(1).data_type(), &DataType::Int64);
    }
}
