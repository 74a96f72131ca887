//! Per-column dictionary encodings.
//!
//! The framing layer wants a dictionary context for every column even though
//! no column here is actually dictionary-compressed. Columns without a
//! declared encoding get an identity encoding keyed by their position, or by
//! the next id above it when a declared encoding already holds that one.

use arrow_schema::Field;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::column_buffer::ColumnBuffer;
use crate::error::{ConvertError, Result};

pub const META_DICTIONARY_ID: &str = "colframe:dictionary_id";
pub const META_DICTIONARY_ORDERED: &str = "colframe:dictionary_ordered";
pub const META_DICTIONARY_SYNTHESIZED: &str = "colframe:dictionary_synthesized";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DictionaryEncoding {
    pub id: i64,
    pub ordered: bool,
}

impl DictionaryEncoding {
    pub fn new(id: i64, ordered: bool) -> Self {
        Self { id, ordered }
    }

    /// Trivial encoding for a plain column at `position`.
    pub fn identity(position: usize) -> Self {
        Self {
            id: position as i64,
            ordered: false,
        }
    }

    /// Write this encoding into a field's metadata.
    pub fn annotate(&self, field: Field, synthesized: bool) -> Field {
        let mut metadata = field.metadata().clone();
        metadata.insert(META_DICTIONARY_ID.to_string(), self.id.to_string());
        metadata.insert(META_DICTIONARY_ORDERED.to_string(), self.ordered.to_string());
        if synthesized {
            metadata.insert(META_DICTIONARY_SYNTHESIZED.to_string(), "true".to_string());
        } else {
            metadata.remove(META_DICTIONARY_SYNTHESIZED);
        }
        field.with_metadata(metadata)
    }

    /// Read a declared (non-synthesized) encoding from field metadata.
    pub fn declared_on(field: &Field) -> Result<Option<Self>> {
        match Self::from_metadata(field.name(), field.metadata())? {
            Some((encoding, false)) => Ok(Some(encoding)),
            _ => Ok(None),
        }
    }

    fn from_metadata(name: &str, metadata: &HashMap<String, String>) -> Result<Option<(Self, bool)>> {
        let Some(id) = metadata.get(META_DICTIONARY_ID) else {
            return Ok(None);
        };
        let id = id.parse::<i64>().map_err(|_| {
            ConvertError::MalformedInput(format!("field '{}' has dictionary id '{}'", name, id))
        })?;
        let ordered = match metadata.get(META_DICTIONARY_ORDERED).map(String::as_str) {
            None | Some("false") => false,
            Some("true") => true,
            Some(other) => {
                return Err(ConvertError::MalformedInput(format!(
                    "field '{}' has dictionary ordering '{}'",
                    name, other
                )))
            }
        };
        let synthesized = metadata
            .get(META_DICTIONARY_SYNTHESIZED)
            .is_some_and(|v| v == "true");
        Ok(Some((Self { id, ordered }, synthesized)))
    }
}

#[derive(Debug, Clone)]
pub struct DictionaryEntry {
    /// Position of the column in the batch.
    pub column: usize,
    pub buffer: ColumnBuffer,
    pub encoding: DictionaryEncoding,
    pub synthesized: bool,
}

/// Lookup from encoding id to the column it describes.
#[derive(Debug, Clone, Default)]
pub struct DictionaryProvider {
    entries: BTreeMap<i64, DictionaryEntry>,
}

impl DictionaryProvider {
    pub fn get(&self, id: i64) -> Option<&DictionaryEntry> {
        self.entries.get(&id)
    }

    /// Encoding attached to the column at `position`.
    pub fn for_column(&self, position: usize) -> Option<&DictionaryEntry> {
        self.entries.values().find(|e| e.column == position)
    }

    pub fn ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fields annotated with the encoding of their column.
    pub fn annotate_fields(&self, fields: &[Field]) -> Vec<Field> {
        fields
            .iter()
            .enumerate()
            .map(|(i, field)| match self.for_column(i) {
                Some(entry) => entry.encoding.annotate(field.clone(), entry.synthesized),
                None => field.clone(),
            })
            .collect()
    }

    fn insert(&mut self, entry: DictionaryEntry) -> Result<()> {
        let id = entry.encoding.id;
        if let Some(existing) = self.entries.get(&id) {
            return Err(ConvertError::MalformedInput(format!(
                "dictionary id {} is declared by both column {} and column {}",
                id, existing.column, entry.column
            )));
        }
        self.entries.insert(id, entry);
        Ok(())
    }

    /// Identity encoding for `position`, skipping ids already taken.
    fn free_identity(&self, position: usize) -> DictionaryEncoding {
        let mut encoding = DictionaryEncoding::identity(position);
        while self.entries.contains_key(&encoding.id) {
            encoding.id += 1;
        }
        encoding
    }
}

/// Pair each column with its field's encoding, synthesizing identity
/// encodings where a field declares none.
///
/// Declared ids are claimed first; only two declared encodings sharing an id
/// is an error.
pub fn build_dictionaries(columns: &[ColumnBuffer], fields: &[Field]) -> Result<DictionaryProvider> {
    if columns.len() != fields.len() {
        return Err(ConvertError::MalformedInput(format!(
            "{} columns but {} fields",
            columns.len(),
            fields.len()
        )));
    }

    let mut provider = DictionaryProvider::default();
    let mut undeclared = Vec::new();
    for (i, (buffer, field)) in columns.iter().zip(fields).enumerate() {
        match DictionaryEncoding::declared_on(field)? {
            Some(encoding) => provider.insert(DictionaryEntry {
                column: i,
                buffer: buffer.clone(),
                encoding,
                synthesized: false,
            })?,
            None => undeclared.push((i, buffer)),
        }
    }

    for (i, buffer) in undeclared {
        let encoding = provider.free_identity(i);
        provider.insert(DictionaryEntry {
            column: i,
            buffer: buffer.clone(),
            encoding,
            synthesized: true,
        })?;
    }

    debug!("Built dictionary provider with {} entries", provider.len());
    Ok(provider)
}
