//! Conversion between row-major records and column buffers.

use arrow_array::cast::AsArray;
use arrow_array::types::{
    Float32Type, Float64Type, Int32Type, Int64Type, TimestampMillisecondType,
};
use arrow_array::ArrayRef;
use tracing::debug;

use crate::column_buffer::{array_from_values, store_all, ColumnArena, ColumnBuffer, ColumnHandle};
use crate::error::{ConvertError, Result};
use crate::schema::TableSchema;
use crate::types::ColumnType;
use crate::value::{Row, Value};

// ---------------------------------------------------------------------------
// Rows → columns
// ---------------------------------------------------------------------------

/// Transpose `rows` into one column buffer per schema column.
///
/// Every column is built before any of them is placed in the arena, and they
/// are placed all together, so a failing conversion leaves the arena untouched.
/// No numeric widening or narrowing happens here: a value must already carry
/// its column's type.
pub fn rows_to_columns(arena: &ColumnArena, schema: &TableSchema, rows: &[Row]) -> Result<Vec<ColumnHandle>> {
    store_all(arena, build_columns(schema, rows)?)
}

/// Build the column buffers for `rows` without allocating them anywhere.
pub(crate) fn build_columns(schema: &TableSchema, rows: &[Row]) -> Result<Vec<ColumnBuffer>> {
    let width = schema.num_columns();
    if let Some((r, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != width) {
        return Err(ConvertError::RowWidth {
            row: r,
            expected: width,
            actual: row.len(),
        });
    }

    let buffers = schema
        .columns()
        .iter()
        .enumerate()
        .map(|(c, meta)| {
            let array = array_from_values(c, &meta.name, meta.column_type, rows.iter().map(|row| &row[c]))?;
            ColumnBuffer::try_new(meta.name.clone(), meta.column_type, array)
        })
        .collect::<Result<Vec<_>>>()?;

    debug!("Transposed {} rows into {} columns", rows.len(), buffers.len());
    Ok(buffers)
}

// ---------------------------------------------------------------------------
// Columns → rows
// ---------------------------------------------------------------------------

/// Extract the value at `row` from `column`.
///
/// Timestamps come back as raw millisecond counts; null slots as
/// [`Value::Null`].
pub fn read_cell(column: &ColumnBuffer, row: usize) -> Result<Value> {
    if row >= column.len() {
        return Err(ConvertError::IndexOutOfRange {
            target: column.name().to_string(),
            index: row,
            len: column.len(),
        });
    }
    if !column.is_valid(row) {
        return Ok(Value::Null);
    }
    Ok(value_at(column.array(), column.column_type(), row))
}

// `ColumnBuffer` guarantees the array's data type matches `column_type`, so
// the downcasts below cannot fail.
fn value_at(array: &ArrayRef, column_type: ColumnType, row: usize) -> Value {
    match column_type {
        ColumnType::Integer32 => Value::Int32(array.as_primitive::<Int32Type>().value(row)),
        ColumnType::Int64 => Value::Int64(array.as_primitive::<Int64Type>().value(row)),
        ColumnType::Float32 => Value::Float32(array.as_primitive::<Float32Type>().value(row)),
        ColumnType::Float64 => Value::Float64(array.as_primitive::<Float64Type>().value(row)),
        ColumnType::Boolean => Value::Boolean(array.as_boolean().value(row)),
        ColumnType::Utf8String => Value::Utf8(array.as_string::<i32>().value(row).to_string()),
        ColumnType::CategoricalString => {
            Value::Categorical(array.as_string::<i32>().value(row).to_string())
        }
        ColumnType::TimestampMillis => {
            Value::TimestampMillis(array.as_primitive::<TimestampMillisecondType>().value(row))
        }
        ColumnType::RawBytes => Value::Bytes(array.as_binary::<i32>().value(row).to_vec()),
        ColumnType::OpaqueBlob => Value::Blob(array.as_binary::<i32>().value(row).to_vec()),
    }
}

/// Materialise row `row` across `columns`.
pub fn read_row(columns: &[ColumnBuffer], row: usize) -> Result<Row> {
    columns.iter().map(|c| read_cell(c, row)).collect()
}

/// Transpose columns back into rows. All columns must have the same length.
pub fn columns_to_rows(columns: &[ColumnBuffer]) -> Result<Vec<Row>> {
    let Some(first) = columns.first() else {
        return Ok(Vec::new());
    };
    let n_rows = first.len();
    if let Some(bad) = columns.iter().find(|c| c.len() != n_rows) {
        return Err(ConvertError::MalformedInput(format!(
            "column '{}' has {} rows, expected {}",
            bad.name(),
            bad.len(),
            n_rows
        )));
    }

    (0..n_rows).map(|r| read_row(columns, r)).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
