//! Single-batch Arrow IPC file framing.
//!
//! A framed file is exactly what `arrow-ipc`'s `FileWriter` emits for one
//! record batch: the `ARROW1` magic, the schema message, any dictionary
//! batches, one record batch and the footer. Field metadata carries the
//! logical column type and the per-column dictionary encoding.

use arrow_array::{RecordBatch, RecordBatchOptions};
use arrow_ipc::reader::FileReader;
use arrow_ipc::writer::{FileWriter, IpcWriteOptions};
use arrow_ipc::MetadataVersion;
use arrow_schema::{ArrowError, Field, Schema};
use std::io::{Cursor, ErrorKind, Read, Seek, Write};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::batch::ColumnBatch;
use crate::column_buffer::{store_all, ColumnArena, ColumnBuffer, ColumnHandle};
use crate::dictionary::build_dictionaries;
use crate::error::{ConvertError, Result};
use crate::record_batch_convert::build_columns;
use crate::schema::{RowBatch, TableSchema};
use crate::types::{column_type_for_field, META_COLUMN_TYPE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramerOptions {
    /// Buffer alignment in bytes; one of 8, 16, 32, 64.
    pub alignment: u8,
    /// Record each field's logical column type in its metadata.
    pub write_type_hints: bool,
}

impl Default for FramerOptions {
    fn default() -> Self {
        Self {
            alignment: 64,
            write_type_hints: true,
        }
    }
}

impl FramerOptions {
    fn ipc_options(&self) -> Result<IpcWriteOptions> {
        IpcWriteOptions::try_new(self.alignment as usize, false, MetadataVersion::V5).map_err(ConvertError::Arrow)
    }
}

// ---------------------------------------------------------------------------
// Write
// ---------------------------------------------------------------------------

/// Frame `batch` into `sink` as a one-batch Arrow IPC file.
///
/// The column buffers are placed in `arena` once the file has been written
/// and stay there after the call; release the arena to free them. A failed
/// write allocates nothing.
pub fn write_batch<W: Write>(
    arena: &ColumnArena,
    batch: &RowBatch,
    sink: W,
    options: &FramerOptions,
) -> Result<Vec<ColumnHandle>> {
    let ipc_options = options.ipc_options()?;
    let schema = batch.schema();
    let mut fields = schema.to_fields();
    if !options.write_type_hints {
        fields = fields.into_iter().map(strip_type_hint).collect();
    }

    let columns = build_columns(schema, batch.rows())?;
    arena.ensure_room(columns.iter().map(ColumnBuffer::byte_len).sum())?;

    let dictionaries = build_dictionaries(&columns, &fields)?;
    let arrow_schema = Arc::new(Schema::new(dictionaries.annotate_fields(&fields)));

    let record_batch = RecordBatch::try_new_with_options(
        arrow_schema.clone(),
        columns.iter().map(|c| c.array().clone()).collect(),
        &RecordBatchOptions::new().with_row_count(Some(batch.num_rows())),
    )
    .map_err(ConvertError::Arrow)?;

    let mut writer = FileWriter::try_new_with_options(sink, &arrow_schema, ipc_options)?;
    writer.write(&record_batch)?;
    writer.finish()?;

    info!(
        "Framed {} rows x {} columns ({} dictionary entries)",
        batch.num_rows(),
        columns.len(),
        dictionaries.len()
    );
    store_all(arena, columns)
}

/// [`write_batch`] into a fresh byte vector.
pub fn write_to_bytes(arena: &ColumnArena, batch: &RowBatch, options: &FramerOptions) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    write_batch(arena, batch, &mut out, options)?;
    Ok(out)
}

fn strip_type_hint(field: Field) -> Field {
    let mut metadata = field.metadata().clone();
    metadata.remove(META_COLUMN_TYPE);
    field.with_metadata(metadata)
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

/// Parse a one-batch Arrow IPC file, placing its columns in `arena`.
pub fn read_batch<R: Read + Seek>(arena: &Arc<ColumnArena>, source: R) -> Result<ColumnBatch> {
    let mut reader = FileReader::try_new(source, None).map_err(malformed)?;
    let arrow_schema = reader.schema();
    let schema = Arc::new(TableSchema::from_arrow(&arrow_schema)?);

    let batch_count = reader.num_batches();
    if batch_count > 1 {
        warn!("Input holds {} record batches; reading only the first", batch_count);
    }
    let record_batch = match reader.next() {
        Some(batch) => batch.map_err(malformed)?,
        None => return Err(ConvertError::MalformedInput("file contains no record batch".into())),
    };

    let row_count = record_batch.num_rows();
    let mut columns = Vec::with_capacity(record_batch.num_columns());
    for (field, array) in arrow_schema.fields().iter().zip(record_batch.columns()) {
        if array.len() != row_count {
            return Err(ConvertError::MalformedInput(format!(
                "column '{}' has {} rows, batch declares {}",
                field.name(),
                array.len(),
                row_count
            )));
        }
        let column_type = column_type_for_field(field)?;
        let target = column_type.data_type();
        let array = if array.data_type() == &target {
            array.clone()
        } else {
            debug!("Casting column '{}' from {:?} to {:?}", field.name(), array.data_type(), target);
            arrow_cast::cast(array, &target).map_err(malformed)?
        };
        columns.push(ColumnBuffer::try_new(field.name().clone(), column_type, array)?);
    }

    let fields: Vec<Field> = arrow_schema.fields().iter().map(|f| f.as_ref().clone()).collect();
    let dictionaries = build_dictionaries(&columns, &fields)?;
    let handles = store_all(arena, columns)?;

    info!("Parsed {} rows x {} columns", row_count, handles.len());
    Ok(ColumnBatch::from_parts(Arc::clone(arena), schema, handles, row_count, dictionaries))
}

/// [`read_batch`] over an in-memory file.
pub fn read_from_bytes(arena: &Arc<ColumnArena>, bytes: &[u8]) -> Result<ColumnBatch> {
    read_batch(arena, Cursor::new(bytes))
}

fn malformed(err: ArrowError) -> ConvertError {
    match err {
        ArrowError::IoError(_, source)
            if !matches!(source.kind(), ErrorKind::UnexpectedEof | ErrorKind::InvalidInput) =>
        {
            ConvertError::Io(source)
        }
        other => ConvertError::MalformedInput(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::DictionaryEncoding;
    use crate::types::ColumnType;
    use crate::value::Value;

    fn sample() -> RowBatch {
        let schema = Arc::new(
            TableSchema::builder()
                .add_column_float("a")
                .add_column_integer("b")
                .add_column_string("s")
                .build(),
        );
        RowBatch::try_new(
            schema,
            vec![
                vec![Value::Float32(1.0), Value::Int32(10), Value::Utf8("x".into())],
                vec![Value::Float32(2.0), Value::Null, Value::Utf8("y".into())],
            ],
        )
        .unwrap()
    }

    #[test]
    fn round_trip() {
        let batch = sample();
        let bytes = write_to_bytes(&ColumnArena::unbounded(), &batch, &FramerOptions::default()).unwrap();
        assert_eq!(&bytes[..6], b"ARROW1");
        assert_eq!(&bytes[bytes.len() - 6..], b"ARROW1");

        let arena = Arc::new(ColumnArena::unbounded());
        let parsed = read_from_bytes(&arena, &bytes).unwrap();
        assert_eq!(parsed.num_rows(), 2);
        assert_eq!(parsed.num_columns(), 3);
        assert_eq!(parsed.schema(), batch.schema());
        assert_eq!(parsed.to_row_batch().unwrap(), batch);
        assert_eq!(parsed.read_cell(0, 1).unwrap(), Value::Int32(10));
        assert_eq!(arena.len(), 3);
    }

    #[test]
    fn write_leaves_columns_in_arena() {
        let arena = ColumnArena::unbounded();
        let handles = write_batch(&arena, &sample(), Vec::new(), &FramerOptions::default()).unwrap();
        assert_eq!(handles.len(), 3);
        assert_eq!(arena.get(handles[2]).unwrap().column_type(), ColumnType::Utf8String);
    }

    #[test]
    fn identity_dictionaries_are_reported_not_declared() {
        let schema = Arc::new(
            TableSchema::builder()
                .add_column_long("plain")
                .add_column_with_dictionary("cat", ColumnType::CategoricalString, DictionaryEncoding::new(100, true))
                .build(),
        );
        let batch = RowBatch::try_new(
            schema.clone(),
            vec![vec![Value::Int64(1), Value::Categorical("a".into())]],
        )
        .unwrap();
        let bytes = write_to_bytes(&ColumnArena::unbounded(), &batch, &FramerOptions::default()).unwrap();

        let parsed = read_from_bytes(&Arc::new(ColumnArena::unbounded()), &bytes).unwrap();
        assert_eq!(parsed.schema(), &schema);

        let dicts = parsed.dictionaries();
        assert_eq!(dicts.ids().collect::<Vec<_>>(), vec![0, 100]);
        assert!(dicts.get(0).unwrap().synthesized);
        assert_eq!(dicts.for_column(1).unwrap().encoding, DictionaryEncoding::new(100, true));
    }

    #[test]
    fn declared_id_matching_a_later_position_round_trips() {
        let schema = Arc::new(
            TableSchema::builder()
                .add_column_with_dictionary("cat", ColumnType::CategoricalString, DictionaryEncoding::new(1, false))
                .add_column_long("plain")
                .build(),
        );
        let batch = RowBatch::try_new(
            schema.clone(),
            vec![vec![Value::Categorical("a".into()), Value::Int64(1)]],
        )
        .unwrap();

        let write_arena = ColumnArena::unbounded();
        let bytes = write_to_bytes(&write_arena, &batch, &FramerOptions::default()).unwrap();
        assert_eq!(write_arena.len(), 2);

        let parsed = read_from_bytes(&Arc::new(ColumnArena::unbounded()), &bytes).unwrap();
        assert_eq!(parsed.schema(), &schema);
        assert_eq!(parsed.to_row_batch().unwrap(), batch);

        let dicts = parsed.dictionaries();
        assert_eq!(dicts.for_column(0).unwrap().encoding, DictionaryEncoding::new(1, false));
        let plain = dicts.for_column(1).unwrap();
        assert!(plain.synthesized);
        assert_eq!(plain.encoding.id, 2);
    }

    #[test]
    fn failed_write_allocates_nothing() {
        let arena = ColumnArena::unbounded();

        let bad_alignment = FramerOptions {
            alignment: 3,
            ..FramerOptions::default()
        };
        assert!(write_to_bytes(&arena, &sample(), &bad_alignment).is_err());

        let schema = Arc::new(
            TableSchema::builder()
                .add_column_with_dictionary("x", ColumnType::Int64, DictionaryEncoding::new(9, false))
                .add_column_with_dictionary("y", ColumnType::Int64, DictionaryEncoding::new(9, false))
                .build(),
        );
        let clashing = RowBatch::try_new(schema, vec![vec![Value::Int64(1), Value::Int64(2)]]).unwrap();
        assert!(matches!(
            write_to_bytes(&arena, &clashing, &FramerOptions::default()),
            Err(ConvertError::MalformedInput(_))
        ));

        assert!(arena.is_empty());
        assert_eq!(arena.reserved_bytes(), 0);
    }

    #[test]
    fn write_over_budget_fails_before_framing() {
        let arena = ColumnArena::new(16);
        let mut sink = Vec::new();
        let err = write_batch(&arena, &sample(), &mut sink, &FramerOptions::default()).unwrap_err();
        assert!(matches!(err, ConvertError::Allocation(_)), "{err:?}");
        assert!(sink.is_empty());
        assert!(arena.is_empty());
    }

    #[test]
    fn without_hints_categorical_reads_as_string() {
        let schema = Arc::new(TableSchema::builder().add_column_categorical("c").build());
        let batch = RowBatch::try_new(schema, vec![vec![Value::Categorical("k".into())]]).unwrap();
        let options = FramerOptions {
            write_type_hints: false,
            ..FramerOptions::default()
        };
        let bytes = write_to_bytes(&ColumnArena::unbounded(), &batch, &options).unwrap();

        let parsed = read_from_bytes(&Arc::new(ColumnArena::unbounded()), &bytes).unwrap();
        assert_eq!(parsed.schema().column_type(0), Some(ColumnType::Utf8String));
        assert_eq!(parsed.row(0).unwrap(), vec![Value::Utf8("k".into())]);
    }

    #[test]
    fn garbage_is_malformed() {
        let arena = Arc::new(ColumnArena::unbounded());
        for input in [&b""[..], b"ARROW", b"not an arrow file at all, just text"] {
            assert!(matches!(
                read_from_bytes(&arena, input),
                Err(ConvertError::MalformedInput(_))
            ));
        }
        assert!(arena.is_empty());
    }

    #[test]
    fn truncated_footer_is_malformed() {
        let bytes = write_to_bytes(&ColumnArena::unbounded(), &sample(), &FramerOptions::default()).unwrap();
        let cut = &bytes[..bytes.len() - 4];
        assert!(matches!(
            read_from_bytes(&Arc::new(ColumnArena::unbounded()), cut),
            Err(ConvertError::MalformedInput(_))
        ));
    }

    #[test]
    fn failing_sink_is_io_error() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(ErrorKind::BrokenPipe, "sink closed"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let arena = ColumnArena::unbounded();
        let err = write_batch(&arena, &sample(), Broken, &FramerOptions::default()).unwrap_err();
        assert!(matches!(err, ConvertError::Io(_)), "{err:?}");
        assert!(arena.is_empty());
    }

    #[test]
    fn released_arena_invalidates_batch() {
        let bytes = write_to_bytes(&ColumnArena::unbounded(), &sample(), &FramerOptions::default()).unwrap();
        let arena = Arc::new(ColumnArena::unbounded());
        let parsed = read_from_bytes(&arena, &bytes).unwrap();
        arena.release();
        assert!(matches!(parsed.column(0), Err(ConvertError::Allocation(_))));
    }

    #[test]
    fn bad_alignment_is_rejected() {
        let options = FramerOptions {
            alignment: 3,
            ..FramerOptions::default()
        };
        assert!(write_to_bytes(&ColumnArena::unbounded(), &sample(), &options).is_err());
    }
}
