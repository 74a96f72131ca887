use anyhow::{ensure, Context, Result};
use colframe_interop::{
    framer, ColumnArena, ColumnBatch, FramerOptions, Matrix, RowBatch,
};
use std::io::{Cursor, Read, Seek, Write};
use std::sync::Arc;
use tracing::{debug, info};

pub use colframe_arena::ArenaError;
pub use colframe_interop::{
    ColumnBuffer, ColumnMeta, ColumnType, ConvertError, DictionaryEncoding, Row, TableSchema, Value,
};

/// Entry point for row ↔ column ↔ file ↔ matrix conversions.
///
/// Every call gets its own arena. Write calls drop theirs before returning;
/// read calls hand theirs to the returned [`ColumnBatch`].
pub struct Converter {
    config: ConverterConfig,
}

#[derive(Debug, Clone)]
pub struct ConverterConfig {
    /// Byte budget of the arena backing one conversion
    pub arena_capacity_bytes: usize,
    /// IPC buffer alignment (8, 16, 32 or 64)
    pub ipc_alignment: u8,
    /// Record logical column types in field metadata
    pub write_type_hints: bool,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            arena_capacity_bytes: 1024 * 1024 * 1024, // 1GB
            ipc_alignment: 64,
            write_type_hints: true,
        }
    }
}

impl Converter {
    pub fn new(config: ConverterConfig) -> Result<Self> {
        ensure!(
            matches!(config.ipc_alignment, 8 | 16 | 32 | 64),
            "ipc_alignment must be 8, 16, 32 or 64, got {}",
            config.ipc_alignment
        );
        ensure!(config.arena_capacity_bytes > 0, "arena_capacity_bytes must be non-zero");
        debug!("Converter config: {:?}", config);
        Ok(Self { config })
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    fn new_arena(&self) -> ColumnArena {
        ColumnArena::new(self.config.arena_capacity_bytes)
    }

    fn framer_options(&self) -> FramerOptions {
        FramerOptions {
            alignment: self.config.ipc_alignment,
            write_type_hints: self.config.write_type_hints,
        }
    }

    /// Validate `rows` against `schema` into a row-major batch.
    pub fn batch(&self, schema: TableSchema, rows: Vec<Row>) -> Result<RowBatch> {
        RowBatch::try_new(Arc::new(schema), rows).context("Validating rows against schema")
    }

    /// Transpose rows into columns held by a fresh arena.
    pub fn rows_to_columns(&self, batch: &RowBatch) -> Result<ColumnBatch> {
        let arena = Arc::new(self.new_arena());
        ColumnBatch::from_rows(&arena, batch).context("Converting rows to columns")
    }

    /// Frame `batch` into `sink` as a one-batch Arrow IPC file.
    pub fn write_batch<W: Write>(&self, batch: &RowBatch, sink: W) -> Result<()> {
        let arena = self.new_arena();
        framer::write_batch(&arena, batch, sink, &self.framer_options())
            .with_context(|| format!("Writing batch of {} rows", batch.num_rows()))?;
        info!(
            "Wrote {} rows, {} bytes of column buffers",
            batch.num_rows(),
            arena.reserved_bytes()
        );
        Ok(())
    }

    pub fn write_to_bytes(&self, batch: &RowBatch) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_batch(batch, &mut out)?;
        Ok(out)
    }

    /// Parse a one-batch Arrow IPC file. The returned batch owns its arena.
    pub fn read_batch<R: Read + Seek>(&self, source: R) -> Result<ColumnBatch> {
        let arena = Arc::new(self.new_arena());
        let batch = framer::read_batch(&arena, source).context("Reading Arrow IPC batch")?;
        info!("Read {} rows x {} columns", batch.num_rows(), batch.num_columns());
        Ok(batch)
    }

    pub fn read_from_bytes(&self, bytes: &[u8]) -> Result<ColumnBatch> {
        self.read_batch(Cursor::new(bytes))
    }

    /// Copy the batch's numeric columns into a row-major matrix.
    pub fn to_matrix(&self, batch: &ColumnBatch) -> Result<Matrix> {
        batch.to_matrix().context("Materialising matrix")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converter_creation() {
        let converter = Converter::new(ConverterConfig::default()).unwrap();
        assert_eq!(converter.config().ipc_alignment, 64);
    }

    #[test]
    fn test_invalid_config() {
        let bad_alignment = ConverterConfig {
            ipc_alignment: 12,
            ..ConverterConfig::default()
        };
        assert!(Converter::new(bad_alignment).is_err());

        let no_capacity = ConverterConfig {
            arena_capacity_bytes: 0,
            ..ConverterConfig::default()
        };
        assert!(Converter::new(no_capacity).is_err());
    }

    #[test]
    fn test_arena_budget_applies_per_call() {
        let converter = Converter::new(ConverterConfig {
            arena_capacity_bytes: 64,
            ..ConverterConfig::default()
        })
        .unwrap();
        let schema = TableSchema::builder().add_column_long("l").build();
        let rows = (0..1024).map(|i| vec![Value::Int64(i)]).collect();
        let batch = converter.batch(schema, rows).unwrap();

        let err = converter.write_to_bytes(&batch).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConvertError>(),
            Some(ConvertError::Allocation(ArenaError::CapacityExceeded { .. }))
        ));
    }
}
