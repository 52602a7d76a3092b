// In: src/loader/reconcile.rs

//! Concatenation of independently optimized chunks.
//!
//! Each chunk was narrowed on its own, so the same column can arrive as `Int8`
//! in one chunk and `Int16` in the next, or as a dictionary in one chunk and
//! plain text in another. Before concatenating, every column is brought to one
//! common type that represents all of its chunks without changing a value.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef};
use arrow::compute::{cast, concat};
use arrow::record_batch::RecordBatch;
use arrow_schema::{DataType, Field, Schema, SchemaRef};

use crate::error::{EtlError, Result};
use crate::optimizer::dictionary_encode;

/// How a column is rebuilt from its chunks.
#[derive(Debug, Clone, PartialEq)]
enum ColumnTarget {
    /// Cast every chunk to this type, then concatenate.
    Cast(DataType),
    /// Every chunk was dictionary-encoded: decode, concatenate, re-encode once.
    Dictionary,
}

fn integer_rank(data_type: &DataType) -> Option<u8> {
    match data_type {
        DataType::Int8 => Some(0),
        DataType::Int16 => Some(1),
        DataType::Int32 => Some(2),
        DataType::Int64 => Some(3),
        _ => None,
    }
}

fn float_rank(data_type: &DataType) -> Option<u8> {
    match data_type {
        DataType::Float32 => Some(0),
        DataType::Float64 => Some(1),
        _ => None,
    }
}

fn is_text_dictionary(data_type: &DataType) -> bool {
    matches!(data_type, DataType::Dictionary(_, value) if value.as_ref() == &DataType::Utf8)
}

/// Picks the common representation for one column across all chunks.
///
/// `parse_type` is the type the CSV reader produced before optimization and
/// is the fallback whenever the chunk types do not follow a known pattern.
fn reconcile_type(parse_type: &DataType, seen: &[&DataType]) -> ColumnTarget {
    let Some(first) = seen.first() else {
        return ColumnTarget::Cast(parse_type.clone());
    };

    if seen.iter().all(|t| is_text_dictionary(t)) {
        return ColumnTarget::Dictionary;
    }
    if seen.iter().all(|t| *t == *first) {
        return ColumnTarget::Cast((*first).clone());
    }
    if seen.iter().any(|t| is_text_dictionary(t)) {
        return ColumnTarget::Cast(DataType::Utf8);
    }

    let integer_ranks: Option<Vec<u8>> = seen.iter().map(|t| integer_rank(t)).collect();
    if let Some(widest) = integer_ranks.and_then(|r| r.into_iter().max()) {
        return ColumnTarget::Cast(
            [DataType::Int8, DataType::Int16, DataType::Int32, DataType::Int64][widest as usize]
                .clone(),
        );
    }

    let float_ranks: Option<Vec<u8>> = seen.iter().map(|t| float_rank(t)).collect();
    if let Some(widest) = float_ranks.and_then(|r| r.into_iter().max()) {
        return ColumnTarget::Cast(if widest == 0 {
            DataType::Float32
        } else {
            DataType::Float64
        });
    }

    if seen
        .iter()
        .all(|t| integer_rank(t).is_some() || float_rank(t).is_some())
    {
        return ColumnTarget::Cast(DataType::Float64);
    }

    ColumnTarget::Cast(parse_type.clone())
}

/// Concatenates `chunks` in order into one batch.
///
/// With no chunks the result is an empty batch with the parse schema.
pub(crate) fn concat_chunks(parse_schema: &SchemaRef, chunks: &[RecordBatch]) -> Result<RecordBatch> {
    if chunks.is_empty() {
        return Ok(RecordBatch::new_empty(Arc::clone(parse_schema)));
    }
    if chunks
        .iter()
        .any(|chunk| chunk.num_columns() != parse_schema.fields().len())
    {
        return Err(EtlError::Internal(
            "chunk column count differs from the parse schema".to_string(),
        ));
    }

    let mut fields = Vec::with_capacity(parse_schema.fields().len());
    let mut columns = Vec::with_capacity(parse_schema.fields().len());

    for (idx, parse_field) in parse_schema.fields().iter().enumerate() {
        let parts: Vec<&ArrayRef> = chunks.iter().map(|chunk| chunk.column(idx)).collect();
        let seen: Vec<&DataType> = parts.iter().map(|a| a.data_type()).collect();

        let column = match reconcile_type(parse_field.data_type(), &seen) {
            ColumnTarget::Cast(target) => concat_as(&parts, &target)?,
            ColumnTarget::Dictionary => {
                let text = concat_as(&parts, &DataType::Utf8)?;
                dictionary_encode(text.as_ref())?.0
            }
        };

        fields.push(Field::new(
            parse_field.name(),
            column.data_type().clone(),
            parse_field.is_nullable() || column.null_count() > 0,
        ));
        columns.push(column);
    }

    let schema = Arc::new(Schema::new_with_metadata(
        fields,
        parse_schema.metadata().clone(),
    ));
    Ok(RecordBatch::try_new(schema, columns)?)
}

fn concat_as(parts: &[&ArrayRef], target: &DataType) -> Result<ArrayRef> {
    let converted: Vec<ArrayRef> = parts
        .iter()
        .map(|part| {
            if part.data_type() == target {
                Ok(Arc::clone(part))
            } else {
                cast(part.as_ref(), target)
            }
        })
        .collect::<std::result::Result<_, _>>()?;
    let refs: Vec<&dyn Array> = converted.iter().map(|a| a.as_ref()).collect();
    Ok(concat(&refs)?)
}
