use anyhow::Result;
use colframe_core::{ColumnType, Converter, ConverterConfig, DictionaryEncoding, TableSchema, Value};
use tracing::{info, Level};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    info!("colframe - Rust Examples");

    // Example 1: Rows to an Arrow IPC file and back
    round_trip_example()?;

    // Example 2: Numeric columns into a matrix
    matrix_example()?;

    // Example 3: Declared dictionary encodings
    dictionary_example()?;

    // Example 4: Error handling
    error_handling_example()?;

    Ok(())
}

fn round_trip_example() -> Result<()> {
    info!("=== Example 1: Round Trip ===");

    let converter = Converter::new(ConverterConfig::default())?;

    let schema = TableSchema::builder()
        .add_column_long("id")
        .add_column_string("name")
        .add_column_time("created_at")
        .add_column_boolean("active")
        .build();
    let rows = vec![
        vec![
            Value::Int64(1),
            Value::from("ada"),
            Value::TimestampMillis(1_700_000_000_000),
            Value::Boolean(true),
        ],
        vec![
            Value::Int64(2),
            Value::from("grace"),
            Value::Null,
            Value::Boolean(false),
        ],
    ];
    let batch = converter.batch(schema, rows)?;

    let bytes = converter.write_to_bytes(&batch)?;
    info!("Wrote {} rows into {} bytes", batch.num_rows(), bytes.len());

    let read = converter.read_from_bytes(&bytes)?;
    for r in 0..read.num_rows() {
        info!("  row {}: {:?}", r, read.row(r)?);
    }

    Ok(())
}

fn matrix_example() -> Result<()> {
    info!("=== Example 2: Matrix ===");

    let converter = Converter::new(ConverterConfig::default())?;

    let schema = TableSchema::builder()
        .add_column_float("a")
        .add_column_integer("b")
        .build();
    let rows = vec![
        vec![Value::Float32(1.0), Value::Int32(10)],
        vec![Value::Float32(2.0), Value::Int32(20)],
    ];
    let batch = converter.batch(schema, rows)?;
    let read = converter.read_from_bytes(&converter.write_to_bytes(&batch)?)?;

    let matrix = converter.to_matrix(&read)?;
    info!("{} x {} matrix:\n{}", matrix.rows(), matrix.cols(), matrix);

    Ok(())
}

fn dictionary_example() -> Result<()> {
    info!("=== Example 3: Dictionary Encodings ===");

    let converter = Converter::new(ConverterConfig {
        // Small arena for small batches
        arena_capacity_bytes: 16 * 1024 * 1024,
        ..Default::default()
    })?;

    let schema = TableSchema::builder()
        .add_column_with_dictionary("color", ColumnType::CategoricalString, DictionaryEncoding::new(7, false))
        .add_column_double("weight")
        .build();
    let rows = vec![
        vec![Value::Categorical("red".into()), Value::Float64(0.5)],
        vec![Value::Categorical("blue".into()), Value::Float64(1.5)],
    ];
    let batch = converter.batch(schema, rows)?;
    let read = converter.read_from_bytes(&converter.write_to_bytes(&batch)?)?;

    for id in read.dictionaries().ids() {
        if let Some(entry) = read.dictionaries().get(id) {
            info!(
                "  dictionary {} -> column '{}' (synthesized: {})",
                id,
                entry.buffer.name(),
                entry.synthesized
            );
        }
    }

    Ok(())
}

fn error_handling_example() -> Result<()> {
    info!("=== Example 4: Error Handling ===");

    let converter = Converter::new(ConverterConfig::default())?;

    // Wrong value type for the column
    let schema = TableSchema::builder().add_column_float("f").build();
    match converter.batch(schema, vec![vec![Value::Float64(1.0)]]) {
        Ok(_) => {}
        Err(e) => info!("Expected coercion error: {:#}", e),
    }

    // Not an Arrow file
    match converter.read_from_bytes(b"hello") {
        Ok(_) => {}
        Err(e) => info!("Expected malformed input error: {:#}", e),
    }

    // Non-numeric column in a matrix
    let schema = TableSchema::builder().add_column_blob("payload").build();
    let batch = converter.batch(schema, vec![vec![Value::Blob(vec![1, 2, 3])]])?;
    let columns = converter.rows_to_columns(&batch)?;
    match converter.to_matrix(&columns) {
        Ok(_) => {}
        Err(e) => info!("Expected unsupported type error: {:#}", e),
    }

    Ok(())
}
