use std::fmt;
use std::sync::Arc;

use crate::common::{DbError, Result};

use super::DataType;

/// Represents a single column of a tuple shape. Names are descriptive only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name, absent for anonymous columns
    name: Option<String>,

    /// Column data type
    data_type: DataType,
}

impl Column {
    /// Creates a named column definition.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: Some(name.into()),
            data_type,
        }
    }

    /// Creates a column without a name.
    pub fn unnamed(data_type: DataType) -> Self {
        Self {
            name: None,
            data_type,
        }
    }

    /// Returns the column name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the column data type.
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Returns the encoded width of this column in bytes.
    pub fn encoded_len(&self) -> usize {
        self.data_type.encoded_len()
    }
}

/// Ordered list of columns describing a tuple shape.
///
/// Two schemas are equal when they have the same number of columns and the
/// same type at every position; names never take part in equality.
#[derive(Debug, Clone)]
pub struct Schema {
    /// Ordered list of columns
    columns: Vec<Column>,

    /// Sum of the encoded widths of all columns
    byte_size: usize,
}

impl Schema {
    /// Creates a new schema from a list of columns.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        if columns.is_empty() {
            return Err(DbError::EmptySchema);
        }
        let byte_size = columns.iter().map(Column::encoded_len).sum();
        Ok(Self { columns, byte_size })
    }

    /// Creates a schema of anonymous columns.
    pub fn from_types(types: &[DataType]) -> Result<Self> {
        Self::new(types.iter().copied().map(Column::unnamed).collect())
    }

    /// Creates a schema builder for fluent construction.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    /// Concatenates two schemas, `a`'s columns first.
    pub fn merge(a: &Schema, b: &Schema) -> Schema {
        let columns: Vec<Column> = a.columns.iter().chain(b.columns.iter()).cloned().collect();
        Schema {
            columns,
            byte_size: a.byte_size + b.byte_size,
        }
    }

    /// Returns a copy with every named column renamed to `prefix.name`.
    pub fn with_prefix(&self, prefix: &str) -> Schema {
        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.as_ref().map(|n| format!("{}.{}", prefix, n)),
                data_type: c.data_type,
            })
            .collect();
        Schema {
            columns,
            byte_size: self.byte_size,
        }
    }

    /// Returns the number of columns in the schema.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Returns the column at the given index.
    pub fn column(&self, index: usize) -> Result<&Column> {
        self.columns
            .get(index)
            .ok_or_else(|| DbError::NotFound(format!("column index {}", index)))
    }

    /// Returns the name of the column at the given index.
    pub fn field_name(&self, index: usize) -> Result<Option<&str>> {
        Ok(self.column(index)?.name())
    }

    /// Returns the type of the column at the given index.
    pub fn field_type(&self, index: usize) -> Result<DataType> {
        Ok(self.column(index)?.data_type())
    }

    /// Returns the index of the first column with the given name.
    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.name() == Some(name))
            .ok_or_else(|| DbError::NotFound(format!("column '{}'", name)))
    }

    /// Returns an iterator over all columns.
    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    /// Returns the encoded size of one tuple of this schema.
    pub fn byte_size(&self) -> usize {
        self.byte_size
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.columns.len() == other.columns.len()
            && self
                .columns
                .iter()
                .zip(other.columns.iter())
                .all(|(a, b)| a.data_type == b.data_type)
    }
}

impl Eq for Schema {}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, col) in self.columns.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}({})", col.name().unwrap_or("null"), col.data_type)?;
        }
        Ok(())
    }
}

/// Builder for constructing schemas fluently.
pub struct SchemaBuilder {
    columns: Vec<Column>,
}

impl SchemaBuilder {
    /// Creates a new schema builder.
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
        }
    }

    /// Adds a named column.
    pub fn column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.columns.push(Column::new(name, data_type));
        self
    }

    /// Adds an anonymous column.
    pub fn unnamed(mut self, data_type: DataType) -> Self {
        self.columns.push(Column::unnamed(data_type));
        self
    }

    /// Builds the schema.
    pub fn build(self) -> Result<Schema> {
        Schema::new(self.columns)
    }

    /// Builds the schema wrapped in an Arc for shared ownership.
    pub fn build_arc(self) -> Result<Arc<Schema>> {
        self.build().map(Arc::new)
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}
