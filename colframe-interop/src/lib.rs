//! Row-major records ↔ Arrow columns.
//!
//! This crate converts between a dynamically-typed, row-oriented record model
//! ([`RowBatch`] of [`Value`]s) and Arrow column buffers, frames those
//! buffers as a single-batch Arrow IPC file, and copies numeric columns into a
//! dense [`Matrix`].
//!
//! # Layout contract
//!
//! Every column buffer lives in a [`ColumnArena`] and is addressed by a
//! [`ColumnHandle`]. All buffers of one conversion share one arena and are
//! released together:
//!
//! ```text
//! rows ──rows_to_columns──▶ arena[handle..] ──write_batch──▶ ARROW1 … ARROW1
//! bytes ──read_batch──▶ ColumnBatch { arena, schema, handles } ──▶ rows | Matrix
//! ```

pub mod batch;
pub mod column_buffer;
pub mod dictionary;
pub mod error;
pub mod framer;
pub mod matrix;
pub mod record_batch_convert;
pub mod schema;
pub mod schema_utils;
pub mod types;
pub mod value;

pub use batch::ColumnBatch;
pub use column_buffer::{
    allocate_column, allocate_column_from, allocate_native, allocate_timestamps, ColumnArena,
    ColumnBuffer, ColumnHandle, NativeColumn,
};
pub use dictionary::{build_dictionaries, DictionaryEncoding, DictionaryProvider};
pub use error::{ConvertError, Result};
pub use framer::{read_batch, read_from_bytes, write_batch, write_to_bytes, FramerOptions};
pub use matrix::{to_matrix, to_matrix_with_rows, Matrix};
pub use record_batch_convert::{columns_to_rows, read_cell, read_row, rows_to_columns};
pub use schema::{ColumnMeta, RowBatch, TableSchema};
pub use schema_utils::SchemaExt;
pub use types::{column_type_for_field, field_for_column, ColumnType};
pub use value::{Row, Value};
