//! Row-oriented schema and record batch.

use arrow_schema::{Field, Schema};
use std::sync::Arc;

use crate::dictionary::DictionaryEncoding;
use crate::error::{ConvertError, Result};
use crate::types::{column_type_for_field, field_for_column, ColumnType};
use crate::value::Row;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: String,
    pub column_type: ColumnType,
    /// Declared encoding; `None` means an identity encoding is synthesized
    /// when the batch is framed.
    pub dictionary: Option<DictionaryEncoding>,
}

/// Ordered list of named, typed columns. Column order is the row-field order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableSchema {
    columns: Vec<ColumnMeta>,
}

impl TableSchema {
    pub fn new(columns: Vec<ColumnMeta>) -> Self {
        Self { columns }
    }

    pub fn builder() -> TableSchemaBuilder {
        TableSchemaBuilder::default()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&ColumnMeta> {
        self.columns.get(index)
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.columns.get(index).map(|c| c.name.as_str())
    }

    pub fn column_type(&self, index: usize) -> Option<ColumnType> {
        self.columns.get(index).map(|c| c.column_type)
    }

    /// Position of the first column called `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn types(&self) -> impl Iterator<Item = ColumnType> + '_ {
        self.columns.iter().map(|c| c.column_type)
    }

    /// Field descriptors, with declared dictionary encodings recorded.
    pub fn to_fields(&self) -> Vec<Field> {
        self.columns
            .iter()
            .map(|c| {
                let field = field_for_column(&c.name, c.column_type);
                match c.dictionary {
                    Some(encoding) => encoding.annotate(field, false),
                    None => field,
                }
            })
            .collect()
    }

    pub fn to_arrow(&self) -> Schema {
        Schema::new(self.to_fields())
    }

    pub fn from_arrow(schema: &Schema) -> Result<Self> {
        let columns = schema
            .fields()
            .iter()
            .map(|f| {
                Ok(ColumnMeta {
                    name: f.name().clone(),
                    column_type: column_type_for_field(f)?,
                    dictionary: DictionaryEncoding::declared_on(f)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { columns })
    }
}

#[derive(Debug, Default)]
pub struct TableSchemaBuilder {
    columns: Vec<ColumnMeta>,
}

impl TableSchemaBuilder {
    pub fn add_column(mut self, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.columns.push(ColumnMeta {
            name: name.into(),
            column_type,
            dictionary: None,
        });
        self
    }

    pub fn add_column_with_dictionary(
        mut self,
        name: impl Into<String>,
        column_type: ColumnType,
        encoding: DictionaryEncoding,
    ) -> Self {
        self.columns.push(ColumnMeta {
            name: name.into(),
            column_type,
            dictionary: Some(encoding),
        });
        self
    }

    pub fn add_column_integer(self, name: impl Into<String>) -> Self {
        self.add_column(name, ColumnType::Integer32)
    }

    pub fn add_column_long(self, name: impl Into<String>) -> Self {
        self.add_column(name, ColumnType::Int64)
    }

    pub fn add_column_float(self, name: impl Into<String>) -> Self {
        self.add_column(name, ColumnType::Float32)
    }

    pub fn add_column_double(self, name: impl Into<String>) -> Self {
        self.add_column(name, ColumnType::Float64)
    }

    pub fn add_column_boolean(self, name: impl Into<String>) -> Self {
        self.add_column(name, ColumnType::Boolean)
    }

    pub fn add_column_string(self, name: impl Into<String>) -> Self {
        self.add_column(name, ColumnType::Utf8String)
    }

    pub fn add_column_categorical(self, name: impl Into<String>) -> Self {
        self.add_column(name, ColumnType::CategoricalString)
    }

    pub fn add_column_time(self, name: impl Into<String>) -> Self {
        self.add_column(name, ColumnType::TimestampMillis)
    }

    pub fn add_column_bytes(self, name: impl Into<String>) -> Self {
        self.add_column(name, ColumnType::RawBytes)
    }

    pub fn add_column_blob(self, name: impl Into<String>) -> Self {
        self.add_column(name, ColumnType::OpaqueBlob)
    }

    pub fn build(self) -> TableSchema {
        TableSchema {
            columns: self.columns,
        }
    }
}

/// Row-major batch: rows validated against one schema.
#[derive(Debug, Clone, PartialEq)]
pub struct RowBatch {
    schema: Arc<TableSchema>,
    rows: Vec<Row>,
}

impl RowBatch {
    pub fn try_new(schema: Arc<TableSchema>, rows: Vec<Row>) -> Result<Self> {
        validate_rows(&schema, &rows)?;
        Ok(Self { schema, rows })
    }

    pub fn schema(&self) -> &Arc<TableSchema> {
        &self.schema
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}

/// Check row width and that every value fits its column.
pub fn validate_rows(schema: &TableSchema, rows: &[Row]) -> Result<()> {
    let width = schema.num_columns();
    for (r, row) in rows.iter().enumerate() {
        if row.len() != width {
            return Err(ConvertError::RowWidth {
                row: r,
                expected: width,
                actual: row.len(),
            });
        }
        for (c, (value, meta)) in row.iter().zip(schema.columns()).enumerate() {
            if !value.fits(meta.column_type) {
                return Err(ConvertError::TypeCoercion {
                    row: r,
                    column: c,
                    name: meta.name.clone(),
                    expected: meta.column_type,
                    actual: value.type_name(),
                });
            }
        }
    }
    Ok(())
}
