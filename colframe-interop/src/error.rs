use arrow_schema::{ArrowError, DataType};
use colframe_arena::ArenaError;
use thiserror::Error;

use crate::types::ColumnType;

pub type Result<T> = std::result::Result<T, ConvertError>;

/// Everything that can make a conversion fail.
///
/// None of these are retried; a failed write leaves no valid output and a
/// failed read yields no batch.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("unsupported column type {column_type:?} for column '{column}'")]
    UnsupportedColumnType {
        column: String,
        column_type: ColumnType,
    },

    #[error("unsupported Arrow type {data_type:?} for field '{field}'")]
    UnsupportedDataType { field: String, data_type: DataType },

    #[error("unknown column type hint '{hint}' on field '{field}'")]
    UnknownTypeHint { field: String, hint: String },

    #[error("row {row}, column {column} ('{name}'): expected {expected:?}, got {actual}")]
    TypeCoercion {
        row: usize,
        column: usize,
        name: String,
        expected: ColumnType,
        actual: &'static str,
    },

    #[error("row {row} has {actual} values but the schema has {expected} columns")]
    RowWidth {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("index {index} out of range for '{target}' with length {len}")]
    IndexOutOfRange {
        target: String,
        index: usize,
        len: usize,
    },

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("allocation failed: {0}")]
    Allocation(#[from] ArenaError),

    #[error("Arrow error: {0}")]
    Arrow(ArrowError),
}

impl ConvertError {
    /// True for every flavour of "no mapping exists for this type".
    pub fn is_unsupported_type(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedColumnType { .. }
                | Self::UnsupportedDataType { .. }
                | Self::UnknownTypeHint { .. }
        )
    }

    /// True when a row value could not be stored in its column.
    pub fn is_type_coercion(&self) -> bool {
        matches!(self, Self::TypeCoercion { .. } | Self::RowWidth { .. })
    }
}

impl From<ArrowError> for ConvertError {
    fn from(err: ArrowError) -> Self {
        match err {
            ArrowError::IoError(_, source) => Self::Io(source),
            ArrowError::ExternalError(source) => match source.downcast::<std::io::Error>() {
                Ok(io) => Self::Io(*io),
                Err(other) => Self::Arrow(ArrowError::ExternalError(other)),
            },
            other => Self::Arrow(other),
        }
    }
}
