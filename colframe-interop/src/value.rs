use crate::types::ColumnType;

/// One dynamically-typed cell of a row.
///
/// Every non-null variant belongs to exactly one [`ColumnType`]; `Null` fits
/// any column.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Boolean(bool),
    Utf8(String),
    Categorical(String),
    TimestampMillis(i64),
    Bytes(Vec<u8>),
    Blob(Vec<u8>),
}

/// A row is positional: value `i` belongs to schema column `i`.
pub type Row = Vec<Value>;

impl Value {
    /// The column type this value is stored as, `None` for `Null`.
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Value::Null => None,
            Value::Int32(_) => Some(ColumnType::Integer32),
            Value::Int64(_) => Some(ColumnType::Int64),
            Value::Float32(_) => Some(ColumnType::Float32),
            Value::Float64(_) => Some(ColumnType::Float64),
            Value::Boolean(_) => Some(ColumnType::Boolean),
            Value::Utf8(_) => Some(ColumnType::Utf8String),
            Value::Categorical(_) => Some(ColumnType::CategoricalString),
            Value::TimestampMillis(_) => Some(ColumnType::TimestampMillis),
            Value::Bytes(_) => Some(ColumnType::RawBytes),
            Value::Blob(_) => Some(ColumnType::OpaqueBlob),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self.column_type() {
            Some(t) => t.hint(),
            None => "null",
        }
    }

    pub fn fits(&self, column_type: ColumnType) -> bool {
        self.column_type().map_or(true, |t| t == column_type)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view used by the matrix path.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Int32(v) => Some(v as f64),
            Value::Int64(v) => Some(v as f64),
            Value::Float32(v) => Some(v as f64),
            Value::Float64(v) => Some(v),
            _ => None,
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Utf8(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Utf8(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
