//! Key resolution against a store's key policy.

use crate::error::{CoreError, CoreResult};
use crate::key::Key;
use keva_codec::Value;

/// A store's key policy, fixed when the store is created.
///
/// With a key path, keys are **in-line**: extracted from that field of the
/// stored value, optionally generated when the field is absent. Without one,
/// keys are **out-of-line**: supplied separately on every write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPolicy {
    /// Field of the value holding the key, or `None` for out-of-line keys.
    pub key_path: Option<String>,
    /// Whether to generate surrogate keys when the key field is absent.
    pub auto_increment: bool,
}

impl KeyPolicy {
    /// Returns whether this policy uses out-of-line keys.
    #[must_use]
    pub fn is_out_of_line(&self) -> bool {
        self.key_path.is_none()
    }
}

/// Resolves the key for a write request.
///
/// For out-of-line stores the supplied key is required. For in-line stores
/// the key is read from the value's key field; when the field is absent and
/// the policy allows it, `alloc` produces the next surrogate key, which is
/// written back into the value before storage.
///
/// Validation happens before `alloc` runs wherever possible, so rejected
/// requests normally burn no surrogate keys.
pub(crate) fn resolve_key<F>(
    policy: &KeyPolicy,
    supplied: Option<Key>,
    value: &mut Value,
    alloc: F,
) -> CoreResult<Key>
where
    F: FnOnce() -> CoreResult<Key>,
{
    resolve_key_inner(policy, supplied, value, alloc).and_then(validate_key)
}

/// Text keys are bounded by the u16 length field of the key wire format.
const MAX_TEXT_KEY_LEN: usize = u16::MAX as usize;

fn validate_key(key: Key) -> CoreResult<Key> {
    if let Key::Text(s) = &key {
        if s.is_empty() {
            return Err(CoreError::invalid_key("empty text key"));
        }
        if s.len() > MAX_TEXT_KEY_LEN {
            return Err(CoreError::invalid_key(format!(
                "text key exceeds maximum length: {} bytes",
                s.len()
            )));
        }
    }
    Ok(key)
}

fn resolve_key_inner<F>(
    policy: &KeyPolicy,
    supplied: Option<Key>,
    value: &mut Value,
    alloc: F,
) -> CoreResult<Key>
where
    F: FnOnce() -> CoreResult<Key>,
{
    let Some(path) = policy.key_path.as_deref() else {
        return supplied.ok_or_else(|| {
            CoreError::missing_key("store uses out-of-line keys, but no key was supplied")
        });
    };

    if supplied.is_some() {
        return Err(CoreError::invalid_key(format!(
            "store keys are in-line at field {path:?}; a separate key cannot be supplied"
        )));
    }

    if let Some(embedded) = value.get(path) {
        return Key::from_value(embedded).ok_or_else(|| {
            CoreError::invalid_key(format!(
                "value at key field {path:?} is not an orderable key"
            ))
        });
    }

    if !policy.auto_increment {
        return Err(CoreError::missing_key(format!(
            "value has no key field {path:?} and the store does not generate keys"
        )));
    }

    if !matches!(value, Value::Map(_)) {
        return Err(CoreError::invalid_key(
            "only map values can carry an in-line key",
        ));
    }

    let key = alloc()?;
    value.set(path, key.to_value());
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn in_line(auto_increment: bool) -> KeyPolicy {
        KeyPolicy {
            key_path: Some("id".to_string()),
            auto_increment,
        }
    }

    fn out_of_line() -> KeyPolicy {
        KeyPolicy {
            key_path: None,
            auto_increment: false,
        }
    }

    fn no_alloc() -> CoreResult<Key> {
        panic!("allocator must not run");
    }

    #[test]
    fn out_of_line_requires_supplied_key() {
        let mut value = Value::map([("name", Value::from("John"))]);

        let key = resolve_key(
            &out_of_line(),
            Some(Key::Integer(1)),
            &mut value,
            no_alloc,
        )
        .unwrap();
        assert_eq!(key, Key::Integer(1));

        let err = resolve_key(&out_of_line(), None, &mut value, no_alloc).unwrap_err();
        assert!(matches!(err, CoreError::MissingKey { .. }));
    }

    #[test]
    fn in_line_key_is_read_from_value() {
        let mut value = Value::map([("id", Value::from(7)), ("name", Value::from("John"))]);

        let key = resolve_key(&in_line(true), None, &mut value, no_alloc).unwrap();
        assert_eq!(key, Key::Integer(7));
        // Value is untouched when the key was already embedded.
        assert_eq!(value.get("id"), Some(&Value::Integer(7)));
    }

    #[test]
    fn in_line_rejects_supplied_key() {
        let mut value = Value::map([("id", Value::from(7))]);

        let err = resolve_key(&in_line(true), Some(Key::Integer(7)), &mut value, no_alloc)
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidKey { .. }));
    }

    #[test]
    fn in_line_rejects_unorderable_embedded_key() {
        for bad in [Value::Null, Value::Bool(true), Value::Text(String::new())] {
            let mut value = Value::map([("id", bad)]);
            let err = resolve_key(&in_line(true), None, &mut value, no_alloc).unwrap_err();
            assert!(matches!(err, CoreError::InvalidKey { .. }));
        }
    }

    #[test]
    fn absent_field_generates_and_writes_back() {
        let mut value = Value::map([("name", Value::from("Joe"))]);

        let key = resolve_key(&in_line(true), None, &mut value, || Ok(Key::Integer(4))).unwrap();
        assert_eq!(key, Key::Integer(4));
        assert_eq!(value.get("id"), Some(&Value::Integer(4)));
    }

    #[test]
    fn absent_field_without_generation_is_missing_key() {
        let mut value = Value::map([("name", Value::from("Joe"))]);

        let err = resolve_key(&in_line(false), None, &mut value, no_alloc).unwrap_err();
        assert!(matches!(err, CoreError::MissingKey { .. }));
    }

    #[test]
    fn non_map_value_cannot_take_generated_key() {
        let mut value = Value::Integer(5);

        let err = resolve_key(&in_line(true), None, &mut value, no_alloc).unwrap_err();
        assert!(matches!(err, CoreError::InvalidKey { .. }));
    }

    #[test]
    fn supplied_empty_or_oversized_text_keys_are_rejected() {
        let mut value = Value::map([("name", Value::from("x"))]);

        let err = resolve_key(
            &out_of_line(),
            Some(Key::Text(String::new())),
            &mut value,
            no_alloc,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::InvalidKey { .. }));

        let long = "k".repeat(MAX_TEXT_KEY_LEN + 1);
        let err = resolve_key(&out_of_line(), Some(Key::Text(long)), &mut value, no_alloc)
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidKey { .. }));
    }

    #[test]
    fn text_keys_are_accepted_in_line() {
        let mut value = Value::map([("id", Value::from("user-9"))]);

        let key = resolve_key(&in_line(true), None, &mut value, no_alloc).unwrap();
        assert_eq!(key, Key::Text("user-9".into()));
    }
}
