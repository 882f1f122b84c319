//! Dynamic document value type.

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// A dynamic value stored in KevaDB.
///
/// Values are document-shaped: scalars, arrays, and maps with text field
/// names. Floats are intentionally not representable so that encoding stays
/// deterministic and keys stay totally ordered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer (full i64 range).
    Integer(i64),
    /// Byte string.
    Bytes(Vec<u8>),
    /// Text string (UTF-8).
    Text(String),
    /// Array of values.
    Array(Vec<Value>),
    /// Map with text field names, kept sorted by name.
    Map(Vec<(String, Value)>),
}

impl Value {
    /// Creates a map value with fields sorted by name.
    ///
    /// When the same name appears more than once, the last entry wins.
    pub fn map<N, I>(fields: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = (N, Value)>,
    {
        let mut pairs: Vec<(String, Value)> = fields
            .into_iter()
            .map(|(name, value)| (name.into(), value))
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        pairs.dedup_by(|a, b| {
            if a.0 == b.0 {
                // `dedup_by` drops `a` (the later element), so move it into
                // the survivor first to keep last-entry-wins semantics.
                b.1 = std::mem::replace(&mut a.1, Value::Null);
                true
            } else {
                false
            }
        });
        Value::Map(pairs)
    }

    /// Checks whether this value is null.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns this value as a boolean, if it is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns this value as an integer, if it is one.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns this value as a text string, if it is one.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns this value as a byte string, if it is one.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Returns this value as an array, if it is one.
    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Returns this value as map fields, if it is a map.
    #[must_use]
    pub fn as_map(&self) -> Option<&[(String, Value)]> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Looks up a field by name in a map value.
    ///
    /// Returns `None` for missing fields and for non-map values.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        match self {
            Value::Map(pairs) => pairs
                .binary_search_by(|(name, _)| name.as_str().cmp(field))
                .ok()
                .map(|idx| &pairs[idx].1),
            _ => None,
        }
    }

    /// Sets a field in a map value, inserting or replacing it.
    ///
    /// Returns `false` (and changes nothing) if this value is not a map.
    pub fn set(&mut self, field: &str, value: Value) -> bool {
        match self {
            Value::Map(pairs) => {
                match pairs.binary_search_by(|(name, _)| name.as_str().cmp(field)) {
                    Ok(idx) => pairs[idx].1 = value,
                    Err(idx) => pairs.insert(idx, (field.to_string(), value)),
                }
                true
            }
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Null
    }
}

impl<T: Into<Value>> FromIterator<T> for Value {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Value::Array(iter.into_iter().map(Into::into).collect())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Integer(n) => serializer.serialize_i64(*n),
            Value::Bytes(b) => serializer.serialize_bytes(b),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(pairs) => {
                let mut map = serializer.serialize_map(Some(pairs.len()))?;
                for (name, value) in pairs {
                    map.serialize_entry(name, value)?;
                }
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_fields_are_sorted() {
        let map = Value::map([
            ("z", Value::from(1)),
            ("a", Value::from(2)),
            ("m", Value::from(3)),
        ]);

        let fields = map.as_map().unwrap();
        assert_eq!(fields[0].0, "a");
        assert_eq!(fields[1].0, "m");
        assert_eq!(fields[2].0, "z");
    }

    #[test]
    fn map_duplicate_fields_last_wins() {
        let map = Value::map([("id", Value::from(1)), ("id", Value::from(2))]);
        assert_eq!(map.get("id"), Some(&Value::Integer(2)));
        assert_eq!(map.as_map().unwrap().len(), 1);
    }

    #[test]
    fn get_looks_up_fields() {
        let map = Value::map([("name", Value::from("Ada")), ("age", Value::from(36))]);

        assert_eq!(map.get("name"), Some(&Value::Text("Ada".to_string())));
        assert_eq!(map.get("age"), Some(&Value::Integer(36)));
        assert_eq!(map.get("missing"), None);
        assert_eq!(Value::Integer(1).get("name"), None);
    }

    #[test]
    fn set_inserts_and_replaces() {
        let mut map = Value::map([("b", Value::from(2))]);

        assert!(map.set("a", Value::from(1)));
        assert!(map.set("b", Value::from(20)));

        let fields = map.as_map().unwrap();
        assert_eq!(fields[0], ("a".to_string(), Value::Integer(1)));
        assert_eq!(fields[1], ("b".to_string(), Value::Integer(20)));

        let mut scalar = Value::Integer(1);
        assert!(!scalar.set("a", Value::Null));
        assert_eq!(scalar, Value::Integer(1));
    }

    #[test]
    fn accessors() {
        assert!(Value::Null.is_null());
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Integer(42).as_integer(), Some(42));
        assert_eq!(Value::Text("hi".into()).as_text(), Some("hi"));
        assert_eq!(Value::Bytes(vec![1, 2]).as_bytes(), Some(&[1u8, 2][..]));
        assert_eq!(Value::Integer(42).as_text(), None);
    }

    #[test]
    fn from_impls() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(42i64), Value::Integer(42));
        assert_eq!(Value::from(42i32), Value::Integer(42));
        assert_eq!(Value::from(42u32), Value::Integer(42));
        assert_eq!(Value::from("hi"), Value::Text("hi".to_string()));
        assert_eq!(Value::from(vec![1u8, 2]), Value::Bytes(vec![1, 2]));
        assert_eq!(Value::from(()), Value::Null);

        let arr: Value = [1i64, 2, 3].into_iter().collect();
        assert_eq!(
            arr,
            Value::Array(vec![
                Value::Integer(1),
                Value::Integer(2),
                Value::Integer(3)
            ])
        );
    }
}
