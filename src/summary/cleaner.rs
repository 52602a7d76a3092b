// In: src/summary/cleaner.rs

//! Post-aggregation cleanup of the vendor summary.
//!
//! Every step is total: it never fails on values, only on a missing column.

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float64Array, LargeStringArray, PrimitiveArray,
    StringArray,
};
use arrow::compute::{binary, cast};
use arrow::datatypes::{
    ArrowPrimitiveType, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type, UInt16Type, UInt32Type,
    UInt64Type, UInt8Type,
};
use arrow::record_batch::RecordBatch;
use arrow_schema::{DataType, Field, Schema};

use super::keys::{column_by_name, is_text};
use crate::error::Result;
use crate::types::columns::*;

/// Runs every cleaning step in order and appends the derived metrics.
pub fn clean_summary(summary: &RecordBatch) -> Result<RecordBatch> {
    let batch = coerce_volume(summary)?;
    let batch = fill_nulls(&batch)?;
    let batch = trim_text_columns(&batch, &[VENDOR_NAME, DESCRIPTION])?;
    with_derived_metrics(&batch)
}

fn replace_column(batch: &RecordBatch, idx: usize, field: Field, column: ArrayRef) -> Result<RecordBatch> {
    let schema = batch.schema();
    let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
    let mut columns = batch.columns().to_vec();
    fields[idx] = field;
    columns[idx] = column;
    Ok(RecordBatch::try_new(
        Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone())),
        columns,
    )?)
}

//==================================================================================
// 1. Volume
//==================================================================================

/// Casts `Volume` to `Float64`. Text that does not parse as a number becomes null.
pub fn coerce_volume(batch: &RecordBatch) -> Result<RecordBatch> {
    let Ok(idx) = batch.schema().index_of(VOLUME) else {
        return Ok(batch.clone());
    };
    let column = batch.column(idx);
    let volume: ArrayRef = if is_text(column.data_type()) {
        let text = cast(column.as_ref(), &DataType::Utf8)?;
        Arc::new(
            text.as_string::<i32>()
                .iter()
                .map(|v| v.and_then(|s| s.trim().parse::<f64>().ok()))
                .collect::<Float64Array>(),
        )
    } else {
        cast(column.as_ref(), &DataType::Float64)?
    };
    replace_column(batch, idx, Field::new(VOLUME, DataType::Float64, true), volume)
}

//==================================================================================
// 2. Null Fill
//==================================================================================

fn fill_primitive<T: ArrowPrimitiveType>(array: &dyn Array) -> ArrayRef {
    let values = array.as_primitive::<T>();
    Arc::new(PrimitiveArray::<T>::from_iter_values(
        values.iter().map(|v| v.unwrap_or_default()),
    ))
}

/// Zero for a column's type, or `None` when the type has no zero.
fn fill_column(array: &ArrayRef) -> Result<Option<ArrayRef>> {
    let filled: ArrayRef = match array.data_type() {
        DataType::Int8 => fill_primitive::<Int8Type>(array.as_ref()),
        DataType::Int16 => fill_primitive::<Int16Type>(array.as_ref()),
        DataType::Int32 => fill_primitive::<Int32Type>(array.as_ref()),
        DataType::Int64 => fill_primitive::<Int64Type>(array.as_ref()),
        DataType::UInt8 => fill_primitive::<UInt8Type>(array.as_ref()),
        DataType::UInt16 => fill_primitive::<UInt16Type>(array.as_ref()),
        DataType::UInt32 => fill_primitive::<UInt32Type>(array.as_ref()),
        DataType::UInt64 => fill_primitive::<UInt64Type>(array.as_ref()),
        DataType::Float32 => fill_primitive::<Float32Type>(array.as_ref()),
        DataType::Float64 => fill_primitive::<Float64Type>(array.as_ref()),
        DataType::Boolean => Arc::new(
            array
                .as_boolean()
                .iter()
                .map(|v| Some(v.unwrap_or(false)))
                .collect::<BooleanArray>(),
        ),
        DataType::Utf8 => Arc::new(
            array
                .as_string::<i32>()
                .iter()
                .map(|v| Some(v.unwrap_or("0")))
                .collect::<StringArray>(),
        ),
        DataType::LargeUtf8 => Arc::new(
            array
                .as_string::<i64>()
                .iter()
                .map(|v| Some(v.unwrap_or("0")))
                .collect::<LargeStringArray>(),
        ),
        DataType::Dictionary(_, value) if is_text(value) => {
            let decoded = cast(array.as_ref(), &DataType::Utf8)?;
            return fill_column(&decoded);
        }
        _ => return Ok(None),
    };
    Ok(Some(filled))
}

/// Replaces nulls with `0`, `0.0`, `false`, or `"0"` according to column type.
/// Columns of other types are left as they are.
pub fn fill_nulls(batch: &RecordBatch) -> Result<RecordBatch> {
    let schema = batch.schema();
    let mut fields = Vec::with_capacity(batch.num_columns());
    let mut columns = Vec::with_capacity(batch.num_columns());
    for (field, column) in schema.fields().iter().zip(batch.columns()) {
        if column.null_count() == 0 {
            fields.push(field.as_ref().clone());
            columns.push(Arc::clone(column));
            continue;
        }
        match fill_column(column)? {
            Some(filled) => {
                fields.push(Field::new(field.name(), filled.data_type().clone(), false));
                columns.push(filled);
            }
            None => {
                log::warn!(
                    "column '{}' of type {} has no zero value; nulls kept",
                    field.name(),
                    column.data_type()
                );
                fields.push(field.as_ref().clone());
                columns.push(Arc::clone(column));
            }
        }
    }
    Ok(RecordBatch::try_new(
        Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone())),
        columns,
    )?)
}

//==================================================================================
// 3. Text Trim
//==================================================================================

/// Trims surrounding whitespace from each named text column that is present.
pub fn trim_text_columns(batch: &RecordBatch, names: &[&str]) -> Result<RecordBatch> {
    let mut batch = batch.clone();
    for name in names {
        let Ok(idx) = batch.schema().index_of(name) else {
            continue;
        };
        let column = batch.column(idx);
        if !is_text(column.data_type()) {
            continue;
        }
        let text = cast(column.as_ref(), &DataType::Utf8)?;
        let trimmed: StringArray = text.as_string::<i32>().iter().map(|v| v.map(str::trim)).collect();
        let nullable = trimmed.null_count() > 0;
        batch = replace_column(
            &batch,
            idx,
            Field::new(*name, DataType::Utf8, nullable),
            Arc::new(trimmed),
        )?;
    }
    Ok(batch)
}

//==================================================================================
// 4. Derived Metrics
//==================================================================================

fn float_column(batch: &RecordBatch, name: &str) -> Result<PrimitiveArray<Float64Type>> {
    let column = column_by_name(SUMMARY_RELATION, batch, name)?;
    let column = cast(column.as_ref(), &DataType::Float64)?;
    Ok(column.as_primitive::<Float64Type>().clone())
}

/// Appends `GrossProfit`, `ProfitMargin`, `StockTurnover` and `SalesToPurchaseRatio`.
///
/// Division follows IEEE-754, so a zero denominator yields `inf`, `-inf` or `NaN`.
pub fn with_derived_metrics(batch: &RecordBatch) -> Result<RecordBatch> {
    let sales_dollars = float_column(batch, TOTAL_SALES_DOLLARS)?;
    let purchase_dollars = float_column(batch, TOTAL_PURCHASE_DOLLARS)?;
    let sales_quantity = float_column(batch, TOTAL_SALES_QUANTITY)?;
    let purchase_quantity = float_column(batch, TOTAL_PURCHASE_QUANTITY)?;

    let gross_profit: Float64Array = binary(&sales_dollars, &purchase_dollars, |s, p| s - p)?;
    let profit_margin: Float64Array = binary(&gross_profit, &sales_dollars, |g, s| g / s * 100.0)?;
    let stock_turnover: Float64Array = binary(&sales_quantity, &purchase_quantity, |s, p| s / p)?;
    let sales_to_purchase: Float64Array = binary(&sales_dollars, &purchase_dollars, |s, p| s / p)?;

    let schema = batch.schema();
    let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
    let mut columns = batch.columns().to_vec();
    for (name, values) in [
        (GROSS_PROFIT, gross_profit),
        (PROFIT_MARGIN, profit_margin),
        (STOCK_TURNOVER, stock_turnover),
        (SALES_TO_PURCHASE_RATIO, sales_to_purchase),
    ] {
        fields.push(Field::new(name, DataType::Float64, values.null_count() > 0));
        columns.push(Arc::new(values));
    }
    Ok(RecordBatch::try_new(
        Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone())),
        columns,
    )?)
}
