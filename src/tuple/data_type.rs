use std::fmt;

/// Represents the data types supported by the database.
/// Every type has a fixed encoded width so tuples of one schema are all the same size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// 32-bit signed integer: 4 bytes, big-endian
    Integer,

    /// String of at most n bytes.
    /// Stored as: length (4 bytes) + data + zero padding up to n
    FixedString(u16),
}

impl DataType {
    /// Returns the number of bytes a value of this type occupies on a page.
    pub fn encoded_len(&self) -> usize {
        match self {
            DataType::Integer => 4,
            DataType::FixedString(n) => 4 + *n as usize,
        }
    }

    /// Parses a type name as it appears in a schema file.
    pub fn parse(name: &str, string_len: u16) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "int" | "integer" => Some(DataType::Integer),
            "string" => Some(DataType::FixedString(string_len)),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Integer => write!(f, "INTEGER"),
            DataType::FixedString(n) => write!(f, "STRING({})", n),
        }
    }
}
