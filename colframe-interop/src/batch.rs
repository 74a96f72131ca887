//! Column-major batch bound to the arena that owns its buffers.

use std::sync::Arc;

use crate::column_buffer::{ColumnArena, ColumnBuffer, ColumnHandle};
use crate::dictionary::{build_dictionaries, DictionaryProvider};
use crate::error::{ConvertError, Result};
use crate::matrix::{to_matrix_with_rows, Matrix};
use crate::record_batch_convert::{read_cell, read_row, rows_to_columns};
use crate::schema::{RowBatch, TableSchema};
use crate::value::{Row, Value};

/// A schema, its column handles and the arena that owns the columns.
///
/// Column access goes through the arena, so holding the batch keeps the arena
/// alive. Releasing the arena explicitly makes column access fail.
#[derive(Debug, Clone)]
pub struct ColumnBatch {
    arena: Arc<ColumnArena>,
    schema: Arc<TableSchema>,
    handles: Vec<ColumnHandle>,
    row_count: usize,
    dictionaries: DictionaryProvider,
}

impl ColumnBatch {
    pub(crate) fn from_parts(
        arena: Arc<ColumnArena>,
        schema: Arc<TableSchema>,
        handles: Vec<ColumnHandle>,
        row_count: usize,
        dictionaries: DictionaryProvider,
    ) -> Self {
        Self {
            arena,
            schema,
            handles,
            row_count,
            dictionaries,
        }
    }

    /// Transpose a row-major batch into columns owned by `arena`.
    pub fn from_rows(arena: &Arc<ColumnArena>, batch: &RowBatch) -> Result<Self> {
        let handles = rows_to_columns(arena, batch.schema(), batch.rows())?;
        let columns = handles
            .iter()
            .map(|h| arena.get(*h))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let dictionaries = build_dictionaries(&columns, &batch.schema().to_fields())?;

        Ok(Self::from_parts(
            Arc::clone(arena),
            batch.schema().clone(),
            handles,
            batch.num_rows(),
            dictionaries,
        ))
    }

    pub fn schema(&self) -> &Arc<TableSchema> {
        &self.schema
    }

    pub fn arena(&self) -> &Arc<ColumnArena> {
        &self.arena
    }

    pub fn handles(&self) -> &[ColumnHandle] {
        &self.handles
    }

    pub fn dictionaries(&self) -> &DictionaryProvider {
        &self.dictionaries
    }

    pub fn num_rows(&self) -> usize {
        self.row_count
    }

    pub fn num_columns(&self) -> usize {
        self.handles.len()
    }

    pub fn column(&self, index: usize) -> Result<ColumnBuffer> {
        let handle = self.handles.get(index).ok_or_else(|| ConvertError::IndexOutOfRange {
            target: "columns".to_string(),
            index,
            len: self.handles.len(),
        })?;
        Ok(self.arena.get(*handle)?)
    }

    pub fn columns(&self) -> Result<Vec<ColumnBuffer>> {
        (0..self.num_columns()).map(|i| self.column(i)).collect()
    }

    pub fn read_cell(&self, row: usize, column: usize) -> Result<Value> {
        read_cell(&self.column(column)?, row)
    }

    pub fn row(&self, index: usize) -> Result<Row> {
        if index >= self.row_count {
            return Err(ConvertError::IndexOutOfRange {
                target: "rows".to_string(),
                index,
                len: self.row_count,
            });
        }
        read_row(&self.columns()?, index)
    }

    /// Copy every row out into a row-major batch.
    pub fn to_row_batch(&self) -> Result<RowBatch> {
        let columns = self.columns()?;
        let rows = (0..self.row_count)
            .map(|r| read_row(&columns, r))
            .collect::<Result<Vec<_>>>()?;
        RowBatch::try_new(self.schema.clone(), rows)
    }

    /// `num_rows() x num_columns()` matrix of the batch's numeric columns.
    pub fn to_matrix(&self) -> Result<Matrix> {
        to_matrix_with_rows(&self.columns()?, self.row_count)
    }
}
