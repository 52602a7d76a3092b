//! This module defines the canonical, type-safe description of the physical
//! representation the type optimizer picked for a column.

use arrow_schema::DataType;
use serde::Serialize;
use std::fmt;

/// Physical width of an integer or float column, in bits.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Width {
    W8,
    W16,
    W32,
    W64,
}

impl Width {
    pub fn bits(&self) -> u32 {
        match self {
            Width::W8 => 8,
            Width::W16 => 16,
            Width::W32 => 32,
            Width::W64 => 64,
        }
    }
}

/// What the optimizer did to a single column of a chunk.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnEncoding {
    /// Stored as a signed integer of the given width.
    Integer(Width),
    /// Stored as a float of the given width.
    Float(Width),
    /// Text stored as dictionary codes with the given signed key width.
    Dictionary(Width),
    /// Left exactly as parsed.
    Unchanged,
}

impl ColumnEncoding {
    /// Derives the encoding from a final Arrow type.
    pub fn from_arrow_type(data_type: &DataType) -> Self {
        match data_type {
            DataType::Int8 => Self::Integer(Width::W8),
            DataType::Int16 => Self::Integer(Width::W16),
            DataType::Int32 => Self::Integer(Width::W32),
            DataType::Int64 => Self::Integer(Width::W64),
            DataType::Float32 => Self::Float(Width::W32),
            DataType::Float64 => Self::Float(Width::W64),
            DataType::Dictionary(key, _) => match key.as_ref() {
                DataType::Int8 => Self::Dictionary(Width::W8),
                DataType::Int16 => Self::Dictionary(Width::W16),
                DataType::Int32 => Self::Dictionary(Width::W32),
                _ => Self::Dictionary(Width::W64),
            },
            _ => Self::Unchanged,
        }
    }

    /// Converts the encoding back into an Arrow `DataType`, if it names one.
    pub fn to_arrow_type(&self) -> Option<DataType> {
        match self {
            Self::Integer(Width::W8) => Some(DataType::Int8),
            Self::Integer(Width::W16) => Some(DataType::Int16),
            Self::Integer(Width::W32) => Some(DataType::Int32),
            Self::Integer(Width::W64) => Some(DataType::Int64),
            Self::Float(Width::W32) => Some(DataType::Float32),
            Self::Float(Width::W64) => Some(DataType::Float64),
            Self::Float(_) => None,
            Self::Dictionary(width) => {
                let key = Self::Integer(*width).to_arrow_type()?;
                Some(DataType::Dictionary(Box::new(key), Box::new(DataType::Utf8)))
            }
            Self::Unchanged => None,
        }
    }
}

impl fmt::Display for ColumnEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(w) => write!(f, "int{}", w.bits()),
            Self::Float(w) => write!(f, "float{}", w.bits()),
            Self::Dictionary(w) => write!(f, "category(int{})", w.bits()),
            Self::Unchanged => write!(f, "unchanged"),
        }
    }
}
