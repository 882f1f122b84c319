//! # Keva Codec
//!
//! Deterministic CBOR encoding/decoding for KevaDB values.
//!
//! Stored values are dynamic documents modeled by [`Value`]. Encoding is
//! deterministic: map fields are kept sorted by name, so identical logical
//! values always produce identical bytes. Determinism rules:
//!
//! - Map keys are text, sorted bytewise, without duplicates
//! - No floats (keys and payloads are integer-exact)
//! - No CBOR tags or indefinite-length items
//!
//! ## Usage
//!
//! ```
//! use keva_codec::{decode, encode, Value};
//!
//! let value = Value::map([("id", Value::from(7)), ("name", Value::from("Ada"))]);
//! let bytes = encode(&value).unwrap();
//! assert_eq!(decode(&bytes).unwrap(), value);
//! ```

mod codec;
mod error;
mod value;

pub use codec::{decode, encode};
pub use error::{CodecError, CodecResult};
pub use value::Value;
