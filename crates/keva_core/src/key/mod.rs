//! Store keys and key resolution.
//!
//! Every record is addressed by a [`Key`]: either a caller-supplied integer
//! or text string, or a store-generated monotonic surrogate integer. The
//! [`resolver`] module applies a store's key policy to a write request and
//! produces the record's key.

mod resolver;

pub(crate) use resolver::resolve_key;
pub use resolver::KeyPolicy;

use crate::error::{CoreError, CoreResult};
use keva_codec::Value;
use std::cmp::Ordering;
use std::fmt;

/// A record key.
///
/// Keys are totally ordered: all integers sort before all text, integers
/// numerically, text lexicographically by UTF-8 bytes. This order defines
/// the iteration order of full-store scans.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// Integer key (caller-supplied or store-generated surrogate).
    Integer(i64),
    /// Text key.
    Text(String),
}

impl Key {
    /// Extracts a key from a value, if the value is usable as one.
    ///
    /// Integers and non-empty text are valid keys. Null, booleans, empty
    /// text, bytes, arrays, and maps are not orderable keys.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Integer(n) => Some(Key::Integer(*n)),
            Value::Text(s) if !s.is_empty() => Some(Key::Text(s.clone())),
            _ => None,
        }
    }

    /// Converts this key back into a value, for in-line key write-back.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Key::Integer(n) => Value::Integer(*n),
            Key::Text(s) => Value::Text(s.clone()),
        }
    }

    /// Returns the integer form of this key, if it is an integer.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Key::Integer(n) => Some(*n),
            Key::Text(_) => None,
        }
    }

    /// Appends the wire encoding of this key to a buffer.
    ///
    /// Format: a tag byte (0 = integer, 1 = text) followed by an 8-byte LE
    /// integer or a u16 LE length and the UTF-8 bytes.
    pub(crate) fn write_to(&self, buf: &mut Vec<u8>) {
        match self {
            Key::Integer(n) => {
                buf.push(0);
                buf.extend_from_slice(&n.to_le_bytes());
            }
            Key::Text(s) => {
                buf.push(1);
                let len = u16::try_from(s.len()).unwrap_or(u16::MAX);
                buf.extend_from_slice(&len.to_le_bytes());
                buf.extend_from_slice(&s.as_bytes()[..len as usize]);
            }
        }
    }

    /// Reads a key from its wire encoding, advancing `cursor`.
    pub(crate) fn read_from(data: &[u8], cursor: &mut usize) -> CoreResult<Self> {
        let tag = *data
            .get(*cursor)
            .ok_or_else(|| CoreError::invalid_format("truncated key tag"))?;
        *cursor += 1;

        match tag {
            0 => {
                let end = *cursor + 8;
                let bytes: [u8; 8] = data
                    .get(*cursor..end)
                    .and_then(|s| s.try_into().ok())
                    .ok_or_else(|| CoreError::invalid_format("truncated integer key"))?;
                *cursor = end;
                Ok(Key::Integer(i64::from_le_bytes(bytes)))
            }
            1 => {
                let len_end = *cursor + 2;
                let len_bytes: [u8; 2] = data
                    .get(*cursor..len_end)
                    .and_then(|s| s.try_into().ok())
                    .ok_or_else(|| CoreError::invalid_format("truncated key length"))?;
                let len = u16::from_le_bytes(len_bytes) as usize;
                let end = len_end + len;
                let text = data
                    .get(len_end..end)
                    .ok_or_else(|| CoreError::invalid_format("truncated text key"))?;
                let text = std::str::from_utf8(text)
                    .map_err(|_| CoreError::invalid_format("text key is not UTF-8"))?;
                *cursor = end;
                Ok(Key::Text(text.to_string()))
            }
            other => Err(CoreError::invalid_format(format!(
                "unknown key tag: {other}"
            ))),
        }
    }

    /// Returns the wire-encoded size of this key in bytes.
    #[must_use]
    pub(crate) fn encoded_len(&self) -> usize {
        match self {
            Key::Integer(_) => 1 + 8,
            Key::Text(s) => 1 + 2 + s.len().min(u16::MAX as usize),
        }
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Key::Integer(a), Key::Integer(b)) => a.cmp(b),
            (Key::Text(a), Key::Text(b)) => a.as_bytes().cmp(b.as_bytes()),
            (Key::Integer(_), Key::Text(_)) => Ordering::Less,
            (Key::Text(_), Key::Integer(_)) => Ordering::Greater,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Integer(n) => write!(f, "{n}"),
            Key::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<i64> for Key {
    fn from(n: i64) -> Self {
        Key::Integer(n)
    }
}

impl From<i32> for Key {
    fn from(n: i32) -> Self {
        Key::Integer(i64::from(n))
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Text(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Text(s)
    }
}
