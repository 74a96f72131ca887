use arrow_schema::{DataType, Schema};

use crate::error::{ConvertError, Result};
use crate::schema::TableSchema;
use crate::types::column_type_for_field;

pub trait SchemaExt {
    fn to_table_schema(&self) -> Result<TableSchema>;
    fn project_by_name(&self, names: &[&str]) -> Result<Schema>;
    fn row_byte_width(&self) -> usize;
    fn is_matrix_compatible(&self) -> bool;
}

impl SchemaExt for Schema {
    fn to_table_schema(&self) -> Result<TableSchema> {
        TableSchema::from_arrow(self)
    }

    fn project_by_name(&self, names: &[&str]) -> Result<Schema> {
        let fields = names
            .iter()
            .map(|n| {
                self.field_with_name(n)
                    .cloned()
                    .map_err(|_| ConvertError::IndexOutOfRange {
                        target: format!("column '{}'", n),
                        index: self.fields().len(),
                        len: self.fields().len(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Schema::new_with_metadata(fields, self.metadata().clone()))
    }

    /// Fixed bytes per row. Variable-width columns count their 4-byte offset;
    /// booleans count one byte.
    fn row_byte_width(&self) -> usize {
        self.fields()
            .iter()
            .map(|f| match f.data_type() {
                DataType::Boolean | DataType::Int8 | DataType::UInt8 => 1,
                DataType::Int16 | DataType::UInt16 | DataType::Float16 => 2,
                DataType::Int32
                | DataType::UInt32
                | DataType::Float32
                | DataType::Date32
                | DataType::Utf8
                | DataType::Binary => 4,
                _ => 8,
            })
            .sum()
    }

    fn is_matrix_compatible(&self) -> bool {
        self.fields()
            .iter()
            .all(|f| column_type_for_field(f).is_ok_and(|t| t.is_numeric()))
    }
}
