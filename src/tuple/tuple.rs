use std::fmt;
use std::sync::Arc;

use bytes::BytesMut;

use crate::common::{DbError, RecordId, Result};

use super::{DataType, Schema, Value};

/// Represents a single row bound to a schema.
///
/// A tuple holds one value per schema column and, once it has been placed on a
/// page, the [`RecordId`] of the slot holding it.
///
/// ## Tuple Binary Format
///
/// Values are written back to back in column order, each using exactly
/// `DataType::encoded_len()` bytes, so every tuple of a schema occupies
/// `Schema::byte_size()` bytes:
///
/// ```text
/// +-----------+-----------+-----+-----------+
/// | column 0  | column 1  | ... | column n  |
/// +-----------+-----------+-----+-----------+
/// ```
#[derive(Debug, Clone)]
pub struct Tuple {
    /// The schema defining the structure of this tuple
    schema: Arc<Schema>,

    /// The values for each column (in schema order)
    values: Vec<Value>,

    /// Location on disk, set once the tuple lives on a page
    record_id: Option<RecordId>,
}

impl Tuple {
    /// Creates a new tuple with the given schema and values.
    pub fn new(schema: Arc<Schema>, values: Vec<Value>) -> Result<Self> {
        if values.len() != schema.column_count() {
            return Err(DbError::SchemaMismatch);
        }
        let values = values
            .into_iter()
            .zip(schema.columns())
            .map(|(v, col)| v.coerce_to(col.data_type()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            schema,
            values,
            record_id: None,
        })
    }

    /// Decodes one tuple from `buf`, advancing it by `schema.byte_size()` bytes.
    pub fn deserialize(schema: Arc<Schema>, buf: &mut &[u8]) -> Result<Self> {
        let values = schema
            .columns()
            .map(|col| Value::deserialize(buf, col.data_type()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            schema,
            values,
            record_id: None,
        })
    }

    /// Creates a tuple from raw bytes using the given schema.
    pub fn from_bytes(schema: Arc<Schema>, data: &[u8]) -> Result<Self> {
        let mut slice = data;
        Self::deserialize(schema, &mut slice)
    }

    /// Returns the schema of this tuple.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Rebinds the tuple to another compatible schema without touching its values.
    pub fn reset_schema(&mut self, schema: Arc<Schema>) -> Result<()> {
        if *schema != *self.schema {
            return Err(DbError::SchemaMismatch);
        }
        self.schema = schema;
        Ok(())
    }

    /// Returns the value at the given column index.
    pub fn value(&self, index: usize) -> Result<&Value> {
        self.values
            .get(index)
            .ok_or_else(|| DbError::NotFound(format!("column index {}", index)))
    }

    /// Returns the value for the given column name.
    pub fn value_by_name(&self, name: &str) -> Result<&Value> {
        self.value(self.schema.index_of(name)?)
    }

    /// Returns all values in this tuple.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Sets the value at the given column index.
    pub fn set_value(&mut self, index: usize, value: Value) -> Result<()> {
        let data_type = self.schema.field_type(index)?;
        self.values[index] = value.coerce_to(data_type)?;
        Ok(())
    }

    /// Returns where the tuple is stored, if anywhere.
    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, record_id: Option<RecordId>) {
        self.record_id = record_id;
    }

    /// Returns the number of columns/values in this tuple.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if this tuple has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Appends the encoded tuple to `buf`.
    pub fn serialize(&self, buf: &mut BytesMut) {
        for value in &self.values {
            value.serialize(buf);
        }
    }

    /// Serializes the tuple to bytes for storage.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(self.schema.byte_size());
        self.serialize(&mut buf);
        buf.to_vec()
    }
}

/// Tuples are equal when their schemas are compatible and their values match.
/// The record id is a location, not part of the row's identity.
impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema && self.values == other.values
    }
}

impl Eq for Tuple {}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str("\t")?;
            }
            write!(f, "{}", value)?;
        }
        Ok(())
    }
}

/// Builder for constructing tuples fluently.
pub struct TupleBuilder {
    schema: Arc<Schema>,
    values: Vec<Value>,
}

impl TupleBuilder {
    /// Creates a new tuple builder for the given schema.
    pub fn new(schema: Arc<Schema>) -> Self {
        let count = schema.column_count();
        Self {
            schema,
            values: Vec::with_capacity(count),
        }
    }

    /// Appends a value for the next column.
    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.values.push(value.into());
        self
    }

    /// Appends an integer for the next column.
    pub fn int(self, v: i32) -> Self {
        self.value(Value::Integer(v))
    }

    /// Appends a string for the next column, bounded by that column's width.
    pub fn string(mut self, text: &str) -> Self {
        let max_len = match self.schema.field_type(self.values.len()) {
            Ok(DataType::FixedString(n)) => n,
            _ => text.len().min(u16::MAX as usize) as u16,
        };
        self.values.push(Value::string(text, max_len));
        self
    }

    /// Builds the tuple.
    pub fn build(self) -> Result<Tuple> {
        Tuple::new(self.schema, self.values)
    }
}
