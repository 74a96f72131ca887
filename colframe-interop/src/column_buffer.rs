//! Typed, fixed-length column buffers and the factory that places them in an
//! arena.

use arrow_array::builder::{
    BinaryBuilder, BooleanBuilder, Float32Builder, Float64Builder, Int32Builder, Int64Builder,
    StringBuilder, TimestampMillisecondBuilder,
};
use arrow_array::{
    new_null_array, Array, ArrayRef, BinaryArray, BooleanArray, Float32Array, Float64Array,
    Int32Array, Int64Array, StringArray, TimestampMillisecondArray,
};
use colframe_arena::{Arena, Footprint, Handle};
use std::sync::Arc;
use tracing::debug;

use crate::error::{ConvertError, Result};
use crate::types::ColumnType;
use crate::value::Value;

pub type ColumnArena = Arena<ColumnBuffer>;
pub type ColumnHandle = Handle;

/// One column's values plus per-slot validity.
///
/// The Arrow array's data type always equals `column_type.data_type()`.
#[derive(Debug, Clone)]
pub struct ColumnBuffer {
    name: String,
    column_type: ColumnType,
    array: ArrayRef,
}

impl ColumnBuffer {
    pub fn try_new(name: impl Into<String>, column_type: ColumnType, array: ArrayRef) -> Result<Self> {
        let name = name.into();
        if array.data_type() != &column_type.data_type() {
            return Err(ConvertError::UnsupportedDataType {
                field: name,
                data_type: array.data_type().clone(),
            });
        }
        Ok(Self {
            name,
            column_type,
            array,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    pub fn array(&self) -> &ArrayRef {
        &self.array
    }

    pub fn len(&self) -> usize {
        self.array.len()
    }

    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    pub fn is_valid(&self, index: usize) -> bool {
        self.array.is_valid(index)
    }

    pub fn null_count(&self) -> usize {
        self.array.null_count()
    }

    /// Bytes held by the underlying Arrow buffers.
    pub fn byte_len(&self) -> usize {
        self.array.get_array_memory_size()
    }
}

impl Footprint for ColumnBuffer {
    fn footprint(&self) -> usize {
        self.byte_len()
    }
}

/// Allocate a zero-filled column of `len` slots, all of them null.
pub fn allocate_column(
    arena: &ColumnArena,
    name: &str,
    column_type: ColumnType,
    len: usize,
) -> Result<ColumnHandle> {
    let array = new_null_array(&column_type.data_type(), len);
    store(arena, ColumnBuffer::try_new(name, column_type, array)?)
}

/// Allocate a column holding a copy of `values`.
pub fn allocate_column_from(
    arena: &ColumnArena,
    name: &str,
    column_type: ColumnType,
    values: &[Value],
) -> Result<ColumnHandle> {
    let array = array_from_values(0, name, column_type, values.iter())?;
    store(arena, ColumnBuffer::try_new(name, column_type, array)?)
}

/// Allocate a column from a slice of native values.
pub fn allocate_native<T: NativeColumn>(arena: &ColumnArena, name: &str, values: &[T]) -> Result<ColumnHandle> {
    store(arena, ColumnBuffer::try_new(name, T::COLUMN_TYPE, T::to_array(values))?)
}

/// Allocate a timestamp column from millisecond counts.
pub fn allocate_timestamps(arena: &ColumnArena, name: &str, millis: &[i64]) -> Result<ColumnHandle> {
    let array = Arc::new(TimestampMillisecondArray::from(millis.to_vec()));
    store(arena, ColumnBuffer::try_new(name, ColumnType::TimestampMillis, array)?)
}

pub(crate) fn store(arena: &ColumnArena, buffer: ColumnBuffer) -> Result<ColumnHandle> {
    debug!(
        "Allocating column '{}' ({}, {} rows, {} bytes)",
        buffer.name(),
        buffer.column_type(),
        buffer.len(),
        buffer.byte_len()
    );
    Ok(arena.insert(buffer)?)
}

/// Place every buffer in `arena`, or none of them.
pub(crate) fn store_all(arena: &ColumnArena, buffers: Vec<ColumnBuffer>) -> Result<Vec<ColumnHandle>> {
    for buffer in &buffers {
        debug!(
            "Allocating column '{}' ({}, {} rows, {} bytes)",
            buffer.name(),
            buffer.column_type(),
            buffer.len(),
            buffer.byte_len()
        );
    }
    Ok(arena.insert_all(buffers)?)
}

/// Native Rust element types with a fixed column type.
pub trait NativeColumn: Sized {
    const COLUMN_TYPE: ColumnType;

    fn to_array(values: &[Self]) -> ArrayRef;
}

impl NativeColumn for i32 {
    const COLUMN_TYPE: ColumnType = ColumnType::Integer32;

    fn to_array(values: &[Self]) -> ArrayRef {
        Arc::new(Int32Array::from(values.to_vec()))
    }
}

impl NativeColumn for i64 {
    const COLUMN_TYPE: ColumnType = ColumnType::Int64;

    fn to_array(values: &[Self]) -> ArrayRef {
        Arc::new(Int64Array::from(values.to_vec()))
    }
}

impl NativeColumn for f32 {
    const COLUMN_TYPE: ColumnType = ColumnType::Float32;

    fn to_array(values: &[Self]) -> ArrayRef {
        Arc::new(Float32Array::from(values.to_vec()))
    }
}

impl NativeColumn for f64 {
    const COLUMN_TYPE: ColumnType = ColumnType::Float64;

    fn to_array(values: &[Self]) -> ArrayRef {
        Arc::new(Float64Array::from(values.to_vec()))
    }
}

impl NativeColumn for bool {
    const COLUMN_TYPE: ColumnType = ColumnType::Boolean;

    fn to_array(values: &[Self]) -> ArrayRef {
        Arc::new(BooleanArray::from(values.to_vec()))
    }
}

impl NativeColumn for String {
    const COLUMN_TYPE: ColumnType = ColumnType::Utf8String;

    fn to_array(values: &[Self]) -> ArrayRef {
        Arc::new(StringArray::from_iter_values(values))
    }
}

impl NativeColumn for &str {
    const COLUMN_TYPE: ColumnType = ColumnType::Utf8String;

    fn to_array(values: &[Self]) -> ArrayRef {
        Arc::new(StringArray::from_iter_values(values))
    }
}

impl NativeColumn for Vec<u8> {
    const COLUMN_TYPE: ColumnType = ColumnType::RawBytes;

    fn to_array(values: &[Self]) -> ArrayRef {
        Arc::new(BinaryArray::from_iter_values(values))
    }
}

// Fills one builder from a value stream. Slots are appended in input order.
macro_rules! fill_builder {
    ($builder:expr, $values:expr, $ctx:expr, $variant:path => |$v:ident| $append:expr) => {{
        let mut builder = $builder;
        for (row, value) in $values.enumerate() {
            match value {
                Value::Null => builder.append_null(),
                $variant($v) => builder.append_value($append),
                other => return Err($ctx.mismatch(row, other)),
            }
        }
        Arc::new(builder.finish()) as ArrayRef
    }};
}

struct FillContext<'a> {
    column: usize,
    name: &'a str,
    column_type: ColumnType,
}

impl FillContext<'_> {
    fn mismatch(&self, row: usize, value: &Value) -> ConvertError {
        ConvertError::TypeCoercion {
            row,
            column: self.column,
            name: self.name.to_string(),
            expected: self.column_type,
            actual: value.type_name(),
        }
    }
}

/// Build the Arrow array for one column. Each column type has exactly one
/// branch, and each branch only accepts its own value variant.
pub(crate) fn array_from_values<'a, I>(
    column: usize,
    name: &str,
    column_type: ColumnType,
    values: I,
) -> Result<ArrayRef>
where
    I: ExactSizeIterator<Item = &'a Value>,
{
    let n = values.len();
    let ctx = FillContext {
        column,
        name,
        column_type,
    };

    let array = match column_type {
        ColumnType::Integer32 => {
            fill_builder!(Int32Builder::with_capacity(n), values, ctx, Value::Int32 => |v| *v)
        }
        ColumnType::Int64 => {
            fill_builder!(Int64Builder::with_capacity(n), values, ctx, Value::Int64 => |v| *v)
        }
        ColumnType::Float32 => {
            fill_builder!(Float32Builder::with_capacity(n), values, ctx, Value::Float32 => |v| *v)
        }
        ColumnType::Float64 => {
            fill_builder!(Float64Builder::with_capacity(n), values, ctx, Value::Float64 => |v| *v)
        }
        ColumnType::Boolean => {
            fill_builder!(BooleanBuilder::with_capacity(n), values, ctx, Value::Boolean => |v| *v)
        }
        ColumnType::Utf8String => {
            fill_builder!(StringBuilder::with_capacity(n, 0), values, ctx, Value::Utf8 => |v| v)
        }
        ColumnType::CategoricalString => {
            fill_builder!(StringBuilder::with_capacity(n, 0), values, ctx, Value::Categorical => |v| v)
        }
        ColumnType::TimestampMillis => fill_builder!(
            TimestampMillisecondBuilder::with_capacity(n),
            values,
            ctx,
            Value::TimestampMillis => |v| *v
        ),
        ColumnType::RawBytes => {
            fill_builder!(BinaryBuilder::with_capacity(n, 0), values, ctx, Value::Bytes => |v| v)
        }
        ColumnType::OpaqueBlob => {
            fill_builder!(BinaryBuilder::with_capacity(n, 0), values, ctx, Value::Blob => |v| v)
        }
    };

    Ok(array)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_array::cast::AsArray;
    use arrow_array::types::{Float32Type, Int32Type};
    use arrow_schema::DataType;

    #[test]
    fn zero_initialized_column_is_all_null() {
        let arena = ColumnArena::unbounded();
        let h = allocate_column(&arena, "c", ColumnType::Float64, 4).unwrap();
        let col = arena.get(h).unwrap();
        assert_eq!(col.len(), 4);
        assert_eq!(col.null_count(), 4);
        assert_eq!(col.array().data_type(), &DataType::Float64);
        assert!(arena.reserved_bytes() > 0);
    }

    #[test]
    fn native_columns() {
        let arena = ColumnArena::unbounded();

        let f = arena.get(allocate_native(&arena, "f", &[1.0f32, 2.0, 3.0]).unwrap()).unwrap();
        assert_eq!(f.len(), 3);
        assert_eq!(f.column_type(), ColumnType::Float32);
        assert_eq!(f.array().as_primitive::<Float32Type>().value(1), 2.0);

        let i = arena.get(allocate_native(&arena, "i", &[i32::MIN, i32::MAX]).unwrap()).unwrap();
        let ints = i.array().as_primitive::<Int32Type>();
        assert_eq!((ints.value(0), ints.value(1)), (i32::MIN, i32::MAX));

        let b = arena.get(allocate_native(&arena, "b", &[true, true, false]).unwrap()).unwrap();
        assert!(!b.array().as_boolean().value(2));

        let s = arena.get(allocate_native(&arena, "s", &["x", "yz"]).unwrap()).unwrap();
        assert_eq!(s.array().as_string::<i32>().value(1), "yz");

        let t = arena.get(allocate_timestamps(&arena, "t", &[1_700_000_000_123]).unwrap()).unwrap();
        assert_eq!(t.column_type(), ColumnType::TimestampMillis);

        assert_eq!(arena.len(), 5);
    }

    #[test]
    fn from_values_copies_every_element() {
        let arena = ColumnArena::unbounded();
        let values = vec![Value::Int64(5), Value::Null, Value::Int64(-1)];
        let col = arena
            .get(allocate_column_from(&arena, "l", ColumnType::Int64, &values).unwrap())
            .unwrap();
        assert_eq!(col.len(), 3);
        assert!(col.is_valid(0));
        assert!(!col.is_valid(1));
    }

    #[test]
    fn from_values_rejects_wrong_width() {
        let arena = ColumnArena::unbounded();
        let values = vec![Value::Float32(1.0), Value::Float64(2.0)];
        let err = allocate_column_from(&arena, "f", ColumnType::Float32, &values).unwrap_err();
        assert!(matches!(err, ConvertError::TypeCoercion { row: 1, .. }));
        assert!(arena.is_empty());
    }

    #[test]
    fn categorical_and_string_are_distinct() {
        let arena = ColumnArena::unbounded();
        let values = vec![Value::Utf8("a".into())];
        assert!(allocate_column_from(&arena, "c", ColumnType::CategoricalString, &values).is_err());
        assert!(allocate_column_from(&arena, "c", ColumnType::Utf8String, &values).is_ok());
    }

    #[test]
    fn mismatched_array_is_rejected() {
        let array: ArrayRef = Arc::new(Int64Array::from(vec![1, 2]));
        assert!(ColumnBuffer::try_new("x", ColumnType::Integer32, array).is_err());
    }

    #[test]
    fn arena_budget_is_fatal() {
        let arena = ColumnArena::new(16);
        let err = allocate_native(&arena, "big", &[0i64; 1024]).unwrap_err();
        assert!(matches!(err, ConvertError::Allocation(_)));
    }
}
