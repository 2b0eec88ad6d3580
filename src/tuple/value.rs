use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use bytes::{Buf, BufMut, BytesMut};

use crate::common::{DbError, Result};

use super::DataType;

/// Comparison operators understood by [`Value::compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEq,
    LessThan,
    LessThanOrEq,
    /// Substring containment, strings only
    Like,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Equals => "=",
            CompareOp::NotEquals => "<>",
            CompareOp::GreaterThan => ">",
            CompareOp::GreaterThanOrEq => ">=",
            CompareOp::LessThan => "<",
            CompareOp::LessThanOrEq => "<=",
            CompareOp::Like => "LIKE",
        };
        f.write_str(s)
    }
}

/// A string bounded by a maximum byte length.
///
/// Text longer than the bound is truncated at construction. Equality and
/// hashing look at the text only, never at the bound.
#[derive(Debug, Clone)]
pub struct FixedString {
    text: String,
    max_len: u16,
}

impl FixedString {
    pub fn new(text: impl Into<String>, max_len: u16) -> Self {
        let mut text = text.into();
        let mut cut = (max_len as usize).min(text.len());
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
        Self { text, max_len }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn max_len(&self) -> u16 {
        self.max_len
    }
}

impl PartialEq for FixedString {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for FixedString {}

impl Hash for FixedString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

/// Represents a typed value that can be stored in a tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// 32-bit signed integer
    Integer(i32),

    /// Bounded string
    String(FixedString),
}

impl Value {
    /// Creates a string value bounded by `max_len` bytes.
    pub fn string(text: impl Into<String>, max_len: u16) -> Self {
        Value::String(FixedString::new(text, max_len))
    }

    /// Returns the DataType of this value.
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Integer(_) => DataType::Integer,
            Value::String(s) => DataType::FixedString(s.max_len()),
        }
    }

    /// Returns the integer payload, if any.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Integer(v) => Some(*v),
            Value::String(_) => None,
        }
    }

    /// Returns the string payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Integer(_) => None,
            Value::String(s) => Some(s.as_str()),
        }
    }

    /// Rebinds this value to the given column type.
    /// Strings adopt the column's bound (truncating if needed); other kinds must match exactly.
    pub fn coerce_to(self, data_type: DataType) -> Result<Value> {
        match (self, data_type) {
            (Value::Integer(v), DataType::Integer) => Ok(Value::Integer(v)),
            (Value::String(s), DataType::FixedString(n)) if s.max_len() == n => Ok(Value::String(s)),
            (Value::String(s), DataType::FixedString(n)) => Ok(Value::string(s.text, n)),
            (v, dt) => Err(DbError::TypeMismatch(format!(
                "cannot store {} in a {} column",
                v.data_type(),
                dt
            ))),
        }
    }

    /// Serializes the value into exactly `self.data_type().encoded_len()` bytes.
    pub fn serialize(&self, buf: &mut BytesMut) {
        match self {
            Value::Integer(v) => buf.put_i32(*v),
            Value::String(s) => {
                let bytes = s.as_str().as_bytes();
                buf.put_i32(bytes.len() as i32);
                buf.put_slice(bytes);
                buf.put_bytes(0, s.max_len() as usize - bytes.len());
            }
        }
    }

    /// Deserializes one value of the given type, advancing `buf` past it.
    pub fn deserialize(buf: &mut &[u8], data_type: DataType) -> Result<Value> {
        if buf.remaining() < data_type.encoded_len() {
            return Err(DbError::Malformed(format!(
                "need {} bytes for {}, have {}",
                data_type.encoded_len(),
                data_type,
                buf.remaining()
            )));
        }

        match data_type {
            DataType::Integer => Ok(Value::Integer(buf.get_i32())),
            DataType::FixedString(max_len) => {
                let len = buf.get_i32();
                if len < 0 || len > max_len as i32 {
                    return Err(DbError::Malformed(format!(
                        "string length {} outside 0..={}",
                        len, max_len
                    )));
                }
                let data: &[u8] = buf;
                let (field, rest) = data.split_at(max_len as usize);
                *buf = rest;
                let text = std::str::from_utf8(&field[..len as usize])
                    .map_err(|e| DbError::Malformed(e.to_string()))?;
                Ok(Value::string(text, max_len))
            }
        }
    }

    /// Orders two values of the same kind.
    pub fn try_cmp(&self, other: &Value) -> Result<Ordering> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Ok(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Ok(a.as_str().cmp(b.as_str())),
            (a, b) => Err(DbError::TypeMismatch(format!(
                "cannot compare {} with {}",
                a.data_type(),
                b.data_type()
            ))),
        }
    }

    /// Evaluates `self op other`.
    pub fn compare(&self, op: CompareOp, other: &Value) -> Result<bool> {
        let ord = || self.try_cmp(other);
        Ok(match op {
            CompareOp::Equals => ord()? == Ordering::Equal,
            CompareOp::NotEquals => ord()? != Ordering::Equal,
            CompareOp::GreaterThan => ord()? == Ordering::Greater,
            CompareOp::GreaterThanOrEq => ord()? != Ordering::Less,
            CompareOp::LessThan => ord()? == Ordering::Less,
            CompareOp::LessThanOrEq => ord()? != Ordering::Greater,
            CompareOp::Like => return self.like(other),
        })
    }

    fn like(&self, other: &Value) -> Result<bool> {
        match (self, other) {
            (Value::String(a), Value::String(b)) => Ok(a.as_str().contains(b.as_str())),
            _ => Err(DbError::TypeMismatch(format!(
                "LIKE is not defined for {} and {}",
                self.data_type(),
                other.data_type()
            ))),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{}", v),
            Value::String(s) => f.write_str(s.as_str()),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: &Value) -> Vec<u8> {
        let mut buf = BytesMut::new();
        value.serialize(&mut buf);
        buf.to_vec()
    }

    #[test]
    fn test_integer_serialization() {
        let bytes = encode(&Value::Integer(42));
        assert_eq!(bytes, vec![0, 0, 0, 42]);

        let mut slice = &bytes[..];
        let recovered = Value::deserialize(&mut slice, DataType::Integer).unwrap();
        assert_eq!(recovered, Value::Integer(42));
        assert!(slice.is_empty());
    }

    #[test]
    fn test_string_serialization_is_padded() {
        let value = Value::string("hi", 5);
        let bytes = encode(&value);
        assert_eq!(bytes, vec![0, 0, 0, 2, b'h', b'i', 0, 0, 0]);
        assert_eq!(bytes.len(), value.data_type().encoded_len());

        let mut slice = &bytes[..];
        let recovered = Value::deserialize(&mut slice, DataType::FixedString(5)).unwrap();
        assert_eq!(recovered, value);
    }

    #[test]
    fn test_string_truncated_at_construction() {
        let value = Value::string("abcdefgh", 3);
        assert_eq!(value.as_str(), Some("abc"));
        // multi-byte char straddling the bound is dropped whole
        let value = Value::string("aé", 2);
        assert_eq!(value.as_str(), Some("a"));
    }

    #[test]
    fn test_malformed_string_length() {
        let bytes = vec![0, 0, 0, 9, b'a', b'b', 0];
        let mut slice = &bytes[..];
        let err = Value::deserialize(&mut slice, DataType::FixedString(3)).unwrap_err();
        assert!(matches!(err, DbError::Malformed(_)));
    }

    #[test]
    fn test_short_input() {
        let bytes = vec![0, 0];
        let mut slice = &bytes[..];
        assert!(Value::deserialize(&mut slice, DataType::Integer).is_err());
    }

    #[test]
    fn test_comparison() {
        let ten = Value::Integer(10);
        let twenty = Value::Integer(20);
        assert!(ten.compare(CompareOp::LessThan, &twenty).unwrap());
        assert!(ten.compare(CompareOp::LessThanOrEq, &ten).unwrap());
        assert!(twenty.compare(CompareOp::GreaterThan, &ten).unwrap());
        assert!(ten.compare(CompareOp::NotEquals, &twenty).unwrap());
        assert!(!ten.compare(CompareOp::Equals, &twenty).unwrap());

        let abc = Value::string("abc", 10);
        let abd = Value::string("abd", 10);
        assert!(abc.compare(CompareOp::LessThan, &abd).unwrap());
    }

    #[test]
    fn test_like() {
        let hay = Value::string("hello world", 20);
        assert!(hay.compare(CompareOp::Like, &Value::string("lo w", 20)).unwrap());
        assert!(!hay.compare(CompareOp::Like, &Value::string("xyz", 20)).unwrap());

        let err = Value::Integer(1).compare(CompareOp::Like, &Value::Integer(1));
        assert!(matches!(err, Err(DbError::TypeMismatch(_))));
    }

    #[test]
    fn test_mismatched_types() {
        let err = Value::Integer(1).compare(CompareOp::Equals, &Value::string("1", 4));
        assert!(matches!(err, Err(DbError::TypeMismatch(_))));
    }

    #[test]
    fn test_equality_ignores_bound() {
        assert_eq!(Value::string("x", 4), Value::string("x", 40));
    }

    #[test]
    fn test_coerce() {
        let v = Value::string("abcdef", 10).coerce_to(DataType::FixedString(3)).unwrap();
        assert_eq!(v.data_type(), DataType::FixedString(3));
        assert_eq!(v.as_str(), Some("abc"));
        assert!(Value::Integer(1).coerce_to(DataType::FixedString(3)).is_err());
    }
}
