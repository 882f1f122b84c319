//! CBOR encoding and decoding.
//!
//! Encoding serializes a [`Value`] through `ciborium`; because map fields
//! are kept sorted by construction, the output is deterministic. Decoding
//! goes through `ciborium`'s dynamic value and is validated: floats, tags,
//! non-text map keys, and duplicate fields are rejected.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use ciborium::value::Value as CborValue;

/// Encodes a value to CBOR bytes.
pub fn encode(value: &Value) -> CodecResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf)
        .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
    Ok(buf)
}

/// Decodes a value from CBOR bytes.
pub fn decode(bytes: &[u8]) -> CodecResult<Value> {
    let cbor: CborValue = ciborium::de::from_reader(bytes)
        .map_err(|e| CodecError::decoding_failed(e.to_string()))?;
    from_cbor(cbor)
}

fn from_cbor(cbor: CborValue) -> CodecResult<Value> {
    match cbor {
        CborValue::Null => Ok(Value::Null),
        CborValue::Bool(b) => Ok(Value::Bool(b)),
        CborValue::Integer(n) => {
            let n = i64::try_from(n).map_err(|_| CodecError::IntegerOutOfRange)?;
            Ok(Value::Integer(n))
        }
        CborValue::Bytes(b) => Ok(Value::Bytes(b)),
        CborValue::Text(s) => Ok(Value::Text(s)),
        CborValue::Array(items) => {
            let items = items
                .into_iter()
                .map(from_cbor)
                .collect::<CodecResult<Vec<_>>>()?;
            Ok(Value::Array(items))
        }
        CborValue::Map(entries) => {
            let mut pairs = Vec::with_capacity(entries.len());
            for (key, value) in entries {
                let CborValue::Text(name) = key else {
                    return Err(CodecError::NonTextMapKey);
                };
                pairs.push((name, from_cbor(value)?));
            }
            pairs.sort_by(|a, b| a.0.cmp(&b.0));
            if pairs.windows(2).any(|w| w[0].0 == w[1].0) {
                return Err(CodecError::decoding_failed("duplicate map field"));
            }
            Ok(Value::Map(pairs))
        }
        CborValue::Float(_) => Err(CodecError::FloatUnsupported),
        CborValue::Tag(..) => Err(CodecError::TagUnsupported),
        other => Err(CodecError::decoding_failed(format!(
            "unsupported CBOR item: {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn roundtrip(value: &Value) -> Value {
        decode(&encode(value).unwrap()).unwrap()
    }

    #[test]
    fn scalars_roundtrip() {
        for value in [
            Value::Null,
            Value::Bool(true),
            Value::Bool(false),
            Value::Integer(0),
            Value::Integer(-100),
            Value::Integer(i64::MAX),
            Value::Integer(i64::MIN),
            Value::Text("hello world".into()),
            Value::Bytes(vec![0xCA, 0xFE]),
        ] {
            assert_eq!(roundtrip(&value), value);
        }
    }

    #[test]
    fn documents_roundtrip() {
        let value = Value::map([
            (
                "users",
                [
                    Value::map([("name", Value::from("Ada")), ("age", Value::from(36))]),
                    Value::map([("name", Value::from("Bob")), ("age", Value::from(25))]),
                ]
                .into_iter()
                .collect(),
            ),
            ("count", Value::from(2)),
        ]);
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn equal_documents_encode_identically() {
        // Same logical map built in two different field orders.
        let a = Value::map([("id", Value::from(1)), ("name", Value::from("Ada"))]);
        let b = Value::map([("name", Value::from("Ada")), ("id", Value::from(1))]);
        assert_eq!(encode(&a).unwrap(), encode(&b).unwrap());
    }

    #[test]
    fn floats_are_rejected() {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(&3.25f64, &mut buf).unwrap();
        assert_eq!(decode(&buf), Err(CodecError::FloatUnsupported));
    }

    #[test]
    fn non_text_map_keys_are_rejected() {
        let cbor = CborValue::Map(vec![(CborValue::Integer(1.into()), CborValue::Null)]);
        let mut buf = Vec::new();
        ciborium::ser::into_writer(&cbor, &mut buf).unwrap();
        assert_eq!(decode(&buf), Err(CodecError::NonTextMapKey));
    }

    #[test]
    fn duplicate_map_fields_are_rejected() {
        let cbor = CborValue::Map(vec![
            (CborValue::Text("a".into()), CborValue::Integer(1.into())),
            (CborValue::Text("a".into()), CborValue::Integer(2.into())),
        ]);
        let mut buf = Vec::new();
        ciborium::ser::into_writer(&cbor, &mut buf).unwrap();
        assert!(decode(&buf).is_err());
    }

    #[test]
    fn truncated_input_is_rejected() {
        let bytes = encode(&Value::Text("hello".into())).unwrap();
        assert!(decode(&bytes[..bytes.len() - 1]).is_err());
    }

    fn arb_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Integer),
            prop::collection::vec(any::<u8>(), 0..16).prop_map(Value::Bytes),
            "[a-z]{0,8}".prop_map(Value::Text),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::vec(("[a-z]{1,4}", inner), 0..4)
                    .prop_map(|fields| Value::map(fields)),
            ]
        })
    }

    proptest! {
        #[test]
        fn any_value_roundtrips(value in arb_value()) {
            prop_assert_eq!(roundtrip(&value), value);
        }

        #[test]
        fn encoding_is_deterministic(value in arb_value()) {
            prop_assert_eq!(encode(&value).unwrap(), encode(&value).unwrap());
        }
    }
}
