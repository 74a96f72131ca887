//! Dense row-major matrix built from numeric columns.

use arrow_array::cast::AsArray;
use arrow_array::types::Float64Type;
use arrow_array::Array;
use arrow_schema::DataType;
use std::fmt;
use std::ops::Index;
use tracing::debug;

use crate::column_buffer::ColumnBuffer;
use crate::error::{ConvertError, Result};

/// `rows x cols` of `f64`, stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row < self.rows && col < self.cols {
            Some(self.data[row * self.cols + col])
        } else {
            None
        }
    }

    pub fn row(&self, row: usize) -> Option<&[f64]> {
        if row < self.rows {
            Some(&self.data[row * self.cols..(row + 1) * self.cols])
        } else {
            None
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    fn index(&self, (row, col): (usize, usize)) -> &f64 {
        assert!(row < self.rows && col < self.cols, "matrix index ({row}, {col}) out of bounds");
        &self.data[row * self.cols + col]
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in (0..self.rows).filter_map(|r| self.row(r)) {
            let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
            writeln!(f, "[{}]", cells.join(", "))?;
        }
        Ok(())
    }
}

/// Copy numeric columns into one matrix, column `c` of the input becoming
/// column `c` of the output.
///
/// Every column must be `Integer32`, `Int64`, `Float32` or `Float64`; they are
/// all widened to `f64`. Null slots become `NaN`. The row count is taken from
/// the first column and every other column must match it.
pub fn to_matrix(columns: &[ColumnBuffer]) -> Result<Matrix> {
    let rows = columns.first().map_or(0, |c| c.len());
    to_matrix_with_rows(columns, rows)
}

/// [`to_matrix`] with a declared row count, so that a batch with no columns
/// still yields `rows x 0`.
pub fn to_matrix_with_rows(columns: &[ColumnBuffer], rows: usize) -> Result<Matrix> {
    if let Some(bad) = columns.iter().find(|c| !c.column_type().is_numeric()) {
        return Err(ConvertError::UnsupportedColumnType {
            column: bad.name().to_string(),
            column_type: bad.column_type(),
        });
    }
    if let Some(short) = columns.iter().find(|c| c.len() != rows) {
        return Err(ConvertError::MalformedInput(format!(
            "column '{}' has {} rows, matrix needs {}",
            short.name(),
            short.len(),
            rows
        )));
    }

    let cols = columns.len();
    let mut matrix = Matrix::zeros(rows, cols);

    for (c, column) in columns.iter().enumerate() {
        let widened = arrow_cast::cast(column.array(), &DataType::Float64)?;
        let values = widened.as_primitive::<Float64Type>();
        for r in 0..rows {
            matrix.data[r * cols + c] = if values.is_valid(r) {
                values.value(r)
            } else {
                f64::NAN
            };
        }
    }

    debug!("Materialised {} x {} matrix", rows, cols);
    Ok(matrix)
}
