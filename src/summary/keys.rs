// In: src/summary/keys.rs

//! Normalized, hashable key values for group-by and join.
//!
//! Source columns may arrive with different physical types after chunk
//! optimization (`Int8` in one relation, `Int32` in another; a dictionary on one
//! side of a join and plain text on the other). Every key column is therefore
//! lowered into one of four logical kinds before any hashing happens, so that
//! equal values produce equal keys regardless of their storage width.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::compute::{cast, cast_with_options, CastOptions};
use arrow::datatypes::{Float64Type, Int64Type};
use arrow::record_batch::RecordBatch;
use arrow_schema::DataType;

use crate::error::{EtlError, Result};

/// A single key cell, comparable across physical types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyValue {
    Null,
    Bool(bool),
    Int(i64),
    /// Bit pattern of a non-integral `f64`. NaN is canonicalized.
    Float(u64),
    Text(String),
}

impl KeyValue {
    pub fn is_null(&self) -> bool {
        matches!(self, KeyValue::Null)
    }

    /// Null and NaN never compare equal to anything, themselves included, so
    /// a join must not match on them.
    pub fn never_equal(&self) -> bool {
        self.is_null() || matches!(self, KeyValue::Float(bits) if f64::from_bits(*bits).is_nan())
    }

    /// Integral floats collapse onto `Int` so that `5.0` and `5` hash alike.
    fn from_f64(value: f64) -> Self {
        if value.is_nan() {
            return KeyValue::Float(f64::NAN.to_bits());
        }
        if value.fract() == 0.0 && value >= i64::MIN as f64 && value < i64::MAX as f64 {
            return KeyValue::Int(value as i64);
        }
        KeyValue::Float(value.to_bits())
    }
}

/// The logical kind of a key column, used to reject nonsensical joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Boolean,
    Numeric,
    Text,
    /// A column of the `Null` type. Compatible with every other kind.
    Null,
}

impl KeyKind {
    pub fn is_compatible_with(self, other: KeyKind) -> bool {
        self == other || self == KeyKind::Null || other == KeyKind::Null
    }
}

#[derive(Debug, Clone)]
enum Normalized {
    Bool(BooleanArray),
    Int(Int64Array),
    Float(Float64Array),
    Text(StringArray),
    Null,
}

/// A key column lowered to its logical representation.
#[derive(Debug, Clone)]
pub struct KeyColumn {
    name: String,
    source: ArrayRef,
    normalized: Normalized,
}

/// Looks up `column` in `batch`, failing with `SchemaMismatch` when absent.
pub fn column_by_name<'b>(relation: &str, batch: &'b RecordBatch, column: &str) -> Result<&'b ArrayRef> {
    batch
        .schema()
        .index_of(column)
        .map(|idx| batch.column(idx))
        .map_err(|_| {
            EtlError::SchemaMismatch(format!(
                "column '{}' not found in relation '{}'",
                column, relation
            ))
        })
}

/// Casts that must not silently turn out-of-range values into nulls.
pub(crate) fn strict_cast(array: &dyn Array, to: &DataType) -> Result<ArrayRef> {
    let options = CastOptions {
        safe: false,
        ..Default::default()
    };
    Ok(cast_with_options(array, to, &options)?)
}

pub(crate) fn is_integer(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

pub(crate) fn is_float(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Float16 | DataType::Float32 | DataType::Float64
    )
}

pub(crate) fn is_text(data_type: &DataType) -> bool {
    match data_type {
        DataType::Utf8 | DataType::LargeUtf8 => true,
        DataType::Dictionary(_, value) => is_text(value),
        _ => false,
    }
}

impl KeyColumn {
    pub fn try_new(relation: &str, batch: &RecordBatch, column: &str) -> Result<Self> {
        let source = Arc::clone(column_by_name(relation, batch, column)?);
        let data_type = source.data_type();

        let normalized = if is_integer(data_type) {
            let widened = strict_cast(source.as_ref(), &DataType::Int64)
                .map_err(|e| key_type_error(relation, column, data_type, e))?;
            Normalized::Int(widened.as_primitive::<Int64Type>().clone())
        } else if is_float(data_type) {
            let widened = cast(source.as_ref(), &DataType::Float64)?;
            Normalized::Float(widened.as_primitive::<Float64Type>().clone())
        } else if is_text(data_type) {
            let decoded = cast(source.as_ref(), &DataType::Utf8)?;
            Normalized::Text(decoded.as_string::<i32>().clone())
        } else if data_type == &DataType::Boolean {
            Normalized::Bool(source.as_boolean().clone())
        } else if data_type == &DataType::Null {
            Normalized::Null
        } else {
            return Err(key_type_error(relation, column, data_type, "unsupported key type"));
        };

        Ok(Self {
            name: column.to_string(),
            source,
            normalized,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The column as stored in the relation.
    pub fn source(&self) -> &ArrayRef {
        &self.source
    }

    pub fn kind(&self) -> KeyKind {
        match self.normalized {
            Normalized::Bool(_) => KeyKind::Boolean,
            Normalized::Int(_) | Normalized::Float(_) => KeyKind::Numeric,
            Normalized::Text(_) => KeyKind::Text,
            Normalized::Null => KeyKind::Null,
        }
    }

    pub fn value(&self, row: usize) -> KeyValue {
        match &self.normalized {
            Normalized::Null => KeyValue::Null,
            Normalized::Bool(a) if a.is_valid(row) => KeyValue::Bool(a.value(row)),
            Normalized::Int(a) if a.is_valid(row) => KeyValue::Int(a.value(row)),
            Normalized::Float(a) if a.is_valid(row) => KeyValue::from_f64(a.value(row)),
            Normalized::Text(a) if a.is_valid(row) => KeyValue::Text(a.value(row).to_string()),
            _ => KeyValue::Null,
        }
    }
}

fn key_type_error(
    relation: &str,
    column: &str,
    data_type: &DataType,
    cause: impl std::fmt::Display,
) -> EtlError {
    EtlError::SchemaMismatch(format!(
        "key column '{}' of relation '{}' has type {}: {}",
        column, relation, data_type, cause
    ))
}

/// Builds the composite key of `row` from `columns`.
pub fn row_key(columns: &[KeyColumn], row: usize) -> Vec<KeyValue> {
    columns.iter().map(|c| c.value(row)).collect()
}

/// Verifies that each `(left, right)` key pair can be compared by value.
pub fn ensure_joinable(left: &[KeyColumn], right: &[KeyColumn]) -> Result<()> {
    for (l, r) in left.iter().zip(right) {
        if !l.kind().is_compatible_with(r.kind()) {
            return Err(EtlError::SchemaMismatch(format!(
                "cannot join {:?} key '{}' ({}) with {:?} key '{}' ({})",
                l.kind(),
                l.name(),
                l.source().data_type(),
                r.kind(),
                r.name(),
                r.source().data_type()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float32Array, Int32Array, Int8Array, UInt64Array};
    use crate::optimizer::dictionary_encode;

    fn batch(columns: Vec<(&str, ArrayRef)>) -> RecordBatch {
        RecordBatch::try_from_iter(columns).unwrap()
    }

    #[test]
    fn test_integer_widths_compare_equal() {
        let b = batch(vec![
            ("a", Arc::new(Int8Array::from(vec![Some(5), None])) as ArrayRef),
            ("b", Arc::new(Int32Array::from(vec![5, 7])) as ArrayRef),
            ("c", Arc::new(Float32Array::from(vec![5.0, 7.5])) as ArrayRef),
        ]);
        let a = KeyColumn::try_new("t", &b, "a").unwrap();
        let bb = KeyColumn::try_new("t", &b, "b").unwrap();
        let c = KeyColumn::try_new("t", &b, "c").unwrap();

        assert_eq!(a.value(0), bb.value(0));
        assert_eq!(c.value(0), KeyValue::Int(5));
        assert_eq!(c.value(1), KeyValue::Float(7.5f64.to_bits()));
        assert!(a.value(1).is_null());
        assert!(ensure_joinable(&[a], &[c]).is_ok());
    }

    #[test]
    fn test_dictionary_and_text_compare_equal() {
        let text = StringArray::from(vec!["x", "y", "x"]);
        let b = batch(vec![
            ("plain", Arc::new(text.clone()) as ArrayRef),
            ("dict", dictionary_encode(&text).unwrap().0),
        ]);
        let plain = KeyColumn::try_new("t", &b, "plain").unwrap();
        let dict = KeyColumn::try_new("t", &b, "dict").unwrap();
        for row in 0..3 {
            assert_eq!(plain.value(row), dict.value(row));
        }
        assert_eq!(dict.kind(), KeyKind::Text);
    }

    #[test]
    fn test_text_and_numeric_are_not_joinable() {
        let b = batch(vec![
            ("n", Arc::new(Int32Array::from(vec![1])) as ArrayRef),
            ("s", Arc::new(StringArray::from(vec!["1"])) as ArrayRef),
        ]);
        let n = KeyColumn::try_new("t", &b, "n").unwrap();
        let s = KeyColumn::try_new("t", &b, "s").unwrap();
        assert!(matches!(ensure_joinable(&[n], &[s]), Err(EtlError::SchemaMismatch(_))));
    }

    #[test]
    fn test_missing_column_and_overflowing_key() {
        let b = batch(vec![(
            "u",
            Arc::new(UInt64Array::from(vec![u64::MAX])) as ArrayRef,
        )]);
        assert!(matches!(
            KeyColumn::try_new("t", &b, "missing"),
            Err(EtlError::SchemaMismatch(_))
        ));
        assert!(matches!(
            KeyColumn::try_new("t", &b, "u"),
            Err(EtlError::SchemaMismatch(_))
        ));
    }
}
