//! Mapping between logical column types and Arrow field descriptors.
//!
//! | `ColumnType`        | Arrow `DataType`                  |
//! |---------------------|-----------------------------------|
//! | `Int64`             | `Int64`                           |
//! | `Integer32`         | `Int32`                           |
//! | `Float64`           | `Float64`                         |
//! | `Float32`           | `Float32`                         |
//! | `Boolean`           | `Boolean`                         |
//! | `Utf8String`        | `Utf8`                            |
//! | `CategoricalString` | `Utf8`                            |
//! | `TimestampMillis`   | `Timestamp(Millisecond, None)`    |
//! | `RawBytes`          | `Binary`                          |
//! | `OpaqueBlob`        | `Binary`                          |
//!
//! Several logical types share a physical type, so every field we emit also
//! carries a `colframe:column_type` metadata entry. Readers that do not know
//! the key still see plain Arrow columns.

use arrow_schema::{DataType, Field, TimeUnit};
use std::collections::HashMap;
use std::fmt;

use crate::error::{ConvertError, Result};

pub const META_COLUMN_TYPE: &str = "colframe:column_type";

/// The fixed set of primitive kinds a column may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Integer32,
    Int64,
    Float32,
    Float64,
    Boolean,
    Utf8String,
    CategoricalString,
    /// Milliseconds since the Unix epoch, kept as a raw `i64`.
    TimestampMillis,
    RawBytes,
    OpaqueBlob,
}

impl ColumnType {
    pub const ALL: [ColumnType; 10] = [
        ColumnType::Integer32,
        ColumnType::Int64,
        ColumnType::Float32,
        ColumnType::Float64,
        ColumnType::Boolean,
        ColumnType::Utf8String,
        ColumnType::CategoricalString,
        ColumnType::TimestampMillis,
        ColumnType::RawBytes,
        ColumnType::OpaqueBlob,
    ];

    /// Physical Arrow type used on the wire.
    pub fn data_type(self) -> DataType {
        match self {
            ColumnType::Integer32 => DataType::Int32,
            ColumnType::Int64 => DataType::Int64,
            ColumnType::Float32 => DataType::Float32,
            ColumnType::Float64 => DataType::Float64,
            ColumnType::Boolean => DataType::Boolean,
            ColumnType::Utf8String | ColumnType::CategoricalString => DataType::Utf8,
            ColumnType::TimestampMillis => DataType::Timestamp(TimeUnit::Millisecond, None),
            ColumnType::RawBytes | ColumnType::OpaqueBlob => DataType::Binary,
        }
    }

    /// Width of one value slot in bits; `None` for variable-width types.
    pub fn bit_width(self) -> Option<usize> {
        match self {
            ColumnType::Boolean => Some(1),
            ColumnType::Integer32 | ColumnType::Float32 => Some(32),
            ColumnType::Int64 | ColumnType::Float64 | ColumnType::TimestampMillis => Some(64),
            ColumnType::Utf8String
            | ColumnType::CategoricalString
            | ColumnType::RawBytes
            | ColumnType::OpaqueBlob => None,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            ColumnType::Integer32 | ColumnType::Int64 | ColumnType::Float32 | ColumnType::Float64
        )
    }

    pub fn hint(self) -> &'static str {
        match self {
            ColumnType::Integer32 => "integer32",
            ColumnType::Int64 => "int64",
            ColumnType::Float32 => "float32",
            ColumnType::Float64 => "float64",
            ColumnType::Boolean => "boolean",
            ColumnType::Utf8String => "string",
            ColumnType::CategoricalString => "categorical",
            ColumnType::TimestampMillis => "timestamp_millis",
            ColumnType::RawBytes => "bytes",
            ColumnType::OpaqueBlob => "blob",
        }
    }

    pub fn from_hint(hint: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.hint() == hint)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.hint())
    }
}

/// Build the nullable field descriptor for a column.
pub fn field_for_column(name: &str, column_type: ColumnType) -> Field {
    let metadata = HashMap::from([(META_COLUMN_TYPE.to_string(), column_type.hint().to_string())]);
    Field::new(name, column_type.data_type(), true).with_metadata(metadata)
}

/// Recover the logical column type of a field.
///
/// A type hint wins when it agrees with the physical type; without one the
/// physical type alone decides.
pub fn column_type_for_field(field: &Field) -> Result<ColumnType> {
    let physical = physical_column_type(field)?;

    match field.metadata().get(META_COLUMN_TYPE) {
        None => Ok(physical),
        Some(hint) => {
            let hinted = ColumnType::from_hint(hint).ok_or_else(|| ConvertError::UnknownTypeHint {
                field: field.name().clone(),
                hint: hint.clone(),
            })?;
            if hinted.data_type() == physical.data_type() {
                Ok(hinted)
            } else {
                Err(ConvertError::UnknownTypeHint {
                    field: field.name().clone(),
                    hint: format!("{} (field is {:?})", hint, field.data_type()),
                })
            }
        }
    }
}

fn physical_column_type(field: &Field) -> Result<ColumnType> {
    match field.data_type() {
        DataType::Int32 => Ok(ColumnType::Integer32),
        DataType::Int64 => Ok(ColumnType::Int64),
        DataType::Float32 => Ok(ColumnType::Float32),
        DataType::Float64 => Ok(ColumnType::Float64),
        DataType::Boolean => Ok(ColumnType::Boolean),
        DataType::Utf8 => Ok(ColumnType::Utf8String),
        DataType::Timestamp(TimeUnit::Millisecond, _) | DataType::Date64 => {
            Ok(ColumnType::TimestampMillis)
        }
        DataType::Binary => Ok(ColumnType::RawBytes),
        other => Err(ConvertError::UnsupportedDataType {
            field: field.name().clone(),
            data_type: other.clone(),
        }),
    }
}

/// A nullable field with no type hint.
pub fn field(name: &str, data_type: DataType) -> Field {
    Field::new(name, data_type, true)
}

pub fn double_field(name: &str) -> Field {
    field_for_column(name, ColumnType::Float64)
}

pub fn float_field(name: &str) -> Field {
    field_for_column(name, ColumnType::Float32)
}

pub fn int_field(name: &str) -> Field {
    field_for_column(name, ColumnType::Integer32)
}

pub fn long_field(name: &str) -> Field {
    field_for_column(name, ColumnType::Int64)
}

pub fn string_field(name: &str) -> Field {
    field_for_column(name, ColumnType::Utf8String)
}

pub fn boolean_field(name: &str) -> Field {
    field_for_column(name, ColumnType::Boolean)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_type_round_trips() {
        for t in ColumnType::ALL {
            let field = field_for_column("c", t);
            assert!(field.is_nullable());
            assert_eq!(column_type_for_field(&field).unwrap(), t, "{t}");
        }
    }

    #[test]
    fn widths_are_exact() {
        assert_eq!(ColumnType::Int64.data_type(), DataType::Int64);
        assert_eq!(ColumnType::Integer32.data_type(), DataType::Int32);
        assert_eq!(ColumnType::Float32.data_type(), DataType::Float32);
        assert_eq!(ColumnType::Float64.bit_width(), Some(64));
        assert_eq!(ColumnType::Boolean.bit_width(), Some(1));
        assert_eq!(ColumnType::OpaqueBlob.bit_width(), None);
    }

    #[test]
    fn unhinted_fields_use_physical_type() {
        assert_eq!(
            column_type_for_field(&field("s", DataType::Utf8)).unwrap(),
            ColumnType::Utf8String
        );
        assert_eq!(
            column_type_for_field(&field("b", DataType::Binary)).unwrap(),
            ColumnType::RawBytes
        );
        assert_eq!(
            column_type_for_field(&field("d", DataType::Date64)).unwrap(),
            ColumnType::TimestampMillis
        );
        assert_eq!(
            column_type_for_field(&field("f", DataType::Float32)).unwrap(),
            ColumnType::Float32
        );
    }

    #[test]
    fn unsupported_widths_fail() {
        for dt in [DataType::Int16, DataType::UInt64, DataType::Float16] {
            let err = column_type_for_field(&field("x", dt)).unwrap_err();
            assert!(err.is_unsupported_type());
            assert!(err.to_string().contains("'x'"));
        }
    }

    #[test]
    fn conflicting_hint_is_rejected() {
        let mut f = field("x", DataType::Int64);
        f.set_metadata(HashMap::from([(
            META_COLUMN_TYPE.to_string(),
            "categorical".to_string(),
        )]));
        assert!(column_type_for_field(&f).unwrap_err().is_unsupported_type());

        f.set_metadata(HashMap::from([(META_COLUMN_TYPE.to_string(), "decimal".to_string())]));
        assert!(matches!(
            column_type_for_field(&f),
            Err(ConvertError::UnknownTypeHint { .. })
        ));
    }

    #[test]
    fn shortcut_fields() {
        assert_eq!(double_field("d").data_type(), &DataType::Float64);
        assert_eq!(float_field("f").data_type(), &DataType::Float32);
        assert_eq!(int_field("i").data_type(), &DataType::Int32);
        assert_eq!(long_field("l").data_type(), &DataType::Int64);
        assert_eq!(string_field("s").data_type(), &DataType::Utf8);
        assert_eq!(boolean_field("b").data_type(), &DataType::Boolean);
    }
}
