// In: src/optimizer/type_optimizer.rs

//! Downcasts numeric columns and dictionary-encodes low-cardinality text.
//!
//! Integers become the smallest signed type that holds the observed range,
//! floats become `f32` only when every value survives the round trip exactly,
//! and text columns whose `distinct / rows` ratio falls below the configured
//! threshold become `Dictionary(K, Utf8)` with codes in first-appearance order.

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, GenericStringArray, OffsetSizeTrait, PrimitiveArray,
    StringDictionaryBuilder,
};
use arrow::compute::cast;
use arrow::datatypes::{
    ArrowDictionaryKeyType, ArrowPrimitiveType, Float64Type, Int16Type, Int32Type, Int64Type,
    Int8Type, UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};
use arrow::record_batch::RecordBatch;
use arrow_schema::{DataType, Field, Schema};
use hashbrown::HashSet;
use num_traits::{PrimInt, ToPrimitive};

use crate::error::{EtlError, Result};
use crate::types::column_encoding::{ColumnEncoding, Width};

//==================================================================================
// 0. Options & Output
//==================================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizerOptions {
    /// Text columns with `distinct / rows` strictly below this are dictionary-encoded.
    pub category_ratio_threshold: f64,
}

impl Default for OptimizerOptions {
    fn default() -> Self {
        Self {
            category_ratio_threshold: 0.5,
        }
    }
}

/// An optimized chunk together with the decision taken for each column.
#[derive(Debug, Clone)]
pub struct OptimizedChunk {
    pub batch: RecordBatch,
    pub encodings: Vec<ColumnEncoding>,
}

//==================================================================================
// 1. Public API
//==================================================================================

/// Optimizes every column of `batch` independently. Column names, order and
/// nullability are preserved.
pub fn optimize_chunk(batch: &RecordBatch, options: &OptimizerOptions) -> Result<OptimizedChunk> {
    if batch.num_rows() == 0 {
        return Ok(OptimizedChunk {
            batch: batch.clone(),
            encodings: vec![ColumnEncoding::Unchanged; batch.num_columns()],
        });
    }

    let schema = batch.schema();
    let mut fields: Vec<Field> = Vec::with_capacity(batch.num_columns());
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(batch.num_columns());
    let mut encodings = Vec::with_capacity(batch.num_columns());

    for (field, column) in schema.fields().iter().zip(batch.columns()) {
        let (optimized, encoding) = optimize_column(column, options)?;
        log::debug!(
            "optimizer: column '{}' {} -> {}",
            field.name(),
            column.data_type(),
            encoding
        );
        fields.push(field.as_ref().clone().with_data_type(optimized.data_type().clone()));
        columns.push(optimized);
        encodings.push(encoding);
    }

    let schema = Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()));
    Ok(OptimizedChunk {
        batch: RecordBatch::try_new(schema, columns)?,
        encodings,
    })
}

/// Dictionary-encodes a text column unconditionally, choosing the smallest
/// signed key type that can index its distinct values.
pub fn dictionary_encode(array: &dyn Array) -> Result<(ArrayRef, Width)> {
    match array.data_type() {
        DataType::Utf8 => encode_strings(array.as_string::<i32>()),
        DataType::LargeUtf8 => encode_strings(array.as_string::<i64>()),
        other => Err(EtlError::UnsupportedType(format!(
            "Cannot dictionary-encode a column of type {}",
            other
        ))),
    }
}

//==================================================================================
// 2. Column Dispatch
//==================================================================================

fn optimize_column(
    column: &ArrayRef,
    options: &OptimizerOptions,
) -> Result<(ArrayRef, ColumnEncoding)> {
    match column.data_type() {
        DataType::Int8 => downcast_integer(column.as_primitive::<Int8Type>(), column),
        DataType::Int16 => downcast_integer(column.as_primitive::<Int16Type>(), column),
        DataType::Int32 => downcast_integer(column.as_primitive::<Int32Type>(), column),
        DataType::Int64 => downcast_integer(column.as_primitive::<Int64Type>(), column),
        DataType::UInt8 => downcast_integer(column.as_primitive::<UInt8Type>(), column),
        DataType::UInt16 => downcast_integer(column.as_primitive::<UInt16Type>(), column),
        DataType::UInt32 => downcast_integer(column.as_primitive::<UInt32Type>(), column),
        DataType::UInt64 => downcast_integer(column.as_primitive::<UInt64Type>(), column),
        DataType::Float64 => downcast_float(column),
        DataType::Utf8 => categorize(column.as_string::<i32>(), column, options),
        DataType::LargeUtf8 => categorize(column.as_string::<i64>(), column, options),
        _ => Ok((Arc::clone(column), ColumnEncoding::Unchanged)),
    }
}

//==================================================================================
// 3. Numeric Downcasting
//==================================================================================

/// Smallest signed width whose range contains `[min, max]`.
fn signed_width_for(min: i128, max: i128) -> Option<Width> {
    [
        (Width::W8, i8::MIN as i128, i8::MAX as i128),
        (Width::W16, i16::MIN as i128, i16::MAX as i128),
        (Width::W32, i32::MIN as i128, i32::MAX as i128),
        (Width::W64, i64::MIN as i128, i64::MAX as i128),
    ]
    .into_iter()
    .find(|&(_, lo, hi)| min >= lo && max <= hi)
    .map(|(width, _, _)| width)
}

fn downcast_integer<T>(
    array: &PrimitiveArray<T>,
    column: &ArrayRef,
) -> Result<(ArrayRef, ColumnEncoding)>
where
    T: ArrowPrimitiveType,
    T::Native: PrimInt,
{
    let range = array.iter().flatten().fold(None, |acc: Option<(i128, i128)>, v| {
        let v = v.to_i128().unwrap_or_default();
        Some(match acc {
            Some((lo, hi)) => (lo.min(v), hi.max(v)),
            None => (v, v),
        })
    });
    let (min, max) = range.unwrap_or((0, 0));

    let Some(width) = signed_width_for(min, max) else {
        // Only reachable for UInt64 values above i64::MAX.
        return Ok((Arc::clone(column), ColumnEncoding::Unchanged));
    };
    let encoding = ColumnEncoding::Integer(width);
    let target = encoding
        .to_arrow_type()
        .ok_or_else(|| EtlError::Internal(format!("no Arrow type for {}", encoding)))?;
    if column.data_type() == &target {
        return Ok((Arc::clone(column), encoding));
    }
    Ok((cast(column.as_ref(), &target)?, encoding))
}

/// `true` when every non-null value survives an f64 -> f32 -> f64 round trip.
fn fits_in_f32(values: &PrimitiveArray<Float64Type>) -> bool {
    values
        .iter()
        .flatten()
        .all(|v| v.is_nan() || (v as f32) as f64 == v)
}

fn downcast_float(column: &ArrayRef) -> Result<(ArrayRef, ColumnEncoding)> {
    if fits_in_f32(column.as_primitive::<Float64Type>()) {
        Ok((
            cast(column.as_ref(), &DataType::Float32)?,
            ColumnEncoding::Float(Width::W32),
        ))
    } else {
        Ok((Arc::clone(column), ColumnEncoding::Float(Width::W64)))
    }
}

//==================================================================================
// 4. Categorical (Dictionary) Encoding
//==================================================================================

fn categorize<O: OffsetSizeTrait>(
    array: &GenericStringArray<O>,
    column: &ArrayRef,
    options: &OptimizerOptions,
) -> Result<(ArrayRef, ColumnEncoding)> {
    // Nulls do not count as a distinct value but do count as a row.
    let distinct: HashSet<&str> = array.iter().flatten().collect();
    let ratio = distinct.len() as f64 / array.len() as f64;
    if ratio >= options.category_ratio_threshold {
        return Ok((Arc::clone(column), ColumnEncoding::Unchanged));
    }
    let (encoded, width) = encode_with_cardinality(array, distinct.len())?;
    Ok((encoded, ColumnEncoding::Dictionary(width)))
}

fn encode_strings<O: OffsetSizeTrait>(array: &GenericStringArray<O>) -> Result<(ArrayRef, Width)> {
    let distinct = array.iter().flatten().collect::<HashSet<&str>>().len();
    encode_with_cardinality(array, distinct)
}

fn encode_with_cardinality<O: OffsetSizeTrait>(
    array: &GenericStringArray<O>,
    distinct: usize,
) -> Result<(ArrayRef, Width)> {
    // Codes run 0..distinct, so the key type must hold `distinct - 1`.
    let max_code = distinct.saturating_sub(1) as i128;
    match signed_width_for(0, max_code) {
        Some(Width::W8) => Ok((build_dictionary::<Int8Type, O>(array)?, Width::W8)),
        Some(Width::W16) => Ok((build_dictionary::<Int16Type, O>(array)?, Width::W16)),
        Some(Width::W32) => Ok((build_dictionary::<Int32Type, O>(array)?, Width::W32)),
        _ => Ok((build_dictionary::<Int64Type, O>(array)?, Width::W64)),
    }
}

/// The builder assigns codes in order of first appearance, which keeps the
/// value -> code mapping stable for a given chunk.
fn build_dictionary<K, O>(array: &GenericStringArray<O>) -> Result<ArrayRef>
where
    K: ArrowDictionaryKeyType,
    O: OffsetSizeTrait,
{
    let mut builder = StringDictionaryBuilder::<K>::new();
    for value in array.iter() {
        match value {
            Some(v) => {
                builder.append(v)?;
            }
            None => builder.append_null(),
        }
    }
    Ok(Arc::new(builder.finish()))
}

//==================================================================================
// 5. Unit Tests
//==================================================================================
