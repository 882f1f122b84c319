//! Store catalog: the persisted registry of named stores.
//!
//! The catalog records, per store: its stable id, its key policy (key path
//! and auto-increment flag), and the next surrogate key. It is the analog of
//! a database manifest and is saved atomically by [`crate::dir::DatabaseDir`].

use crate::error::{CoreError, CoreResult};
use crate::key::KeyPolicy;
use crate::types::{SequenceNumber, StoreId};
use std::collections::HashMap;

/// Magic bytes for the catalog file.
pub const CATALOG_MAGIC: [u8; 4] = *b"KCAT";

/// Current catalog format version.
pub const CATALOG_VERSION: u16 = 1;

/// Surrogate keys start at 1, matching the observed host-store contract.
const FIRST_SURROGATE: i64 = 1;

/// Open-time configuration for a named store.
///
/// The defaults match the most common shape: an in-line key at field `"id"`
/// with surrogate generation enabled. `key_path = None` selects out-of-line
/// keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Store name.
    pub name: String,
    /// Field of the value holding the key, or `None` for out-of-line keys.
    pub key_path: Option<String>,
    /// Whether to generate surrogate keys when the key field is absent.
    pub auto_increment: bool,
}

impl StoreConfig {
    /// Creates a configuration with the default in-line policy (`"id"` key
    /// field, auto-increment on).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_path: Some("id".to_string()),
            auto_increment: true,
        }
    }

    /// Sets the key path (in-line keys).
    #[must_use]
    pub fn key_path(mut self, path: impl Into<String>) -> Self {
        self.key_path = Some(path.into());
        self
    }

    /// Selects out-of-line keys (no key path, no generation).
    #[must_use]
    pub fn out_of_line(mut self) -> Self {
        self.key_path = None;
        self.auto_increment = false;
        self
    }

    /// Sets whether surrogate keys are generated.
    #[must_use]
    pub const fn auto_increment(mut self, value: bool) -> Self {
        self.auto_increment = value;
        self
    }
}

/// Persisted definition of a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreDef {
    /// Stable store id.
    pub id: StoreId,
    /// Key policy, fixed at creation.
    pub policy: KeyPolicy,
    /// Next surrogate key to hand out.
    pub next_surrogate: i64,
}

/// The store registry plus database-level metadata.
#[derive(Debug, Clone)]
pub struct Catalog {
    /// Format version (major, minor).
    pub format_version: (u16, u16),
    /// Store name to definition.
    stores: HashMap<String, StoreDef>,
    /// Next store id to assign.
    next_store_id: u32,
    /// Last checkpoint sequence number.
    pub last_checkpoint: Option<SequenceNumber>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new((1, 0))
    }
}

impl Catalog {
    /// Creates a new empty catalog.
    #[must_use]
    pub fn new(format_version: (u16, u16)) -> Self {
        Self {
            format_version,
            stores: HashMap::new(),
            next_store_id: 1,
            last_checkpoint: None,
        }
    }

    /// Opens a store by name, creating it if absent.
    ///
    /// Opening is idempotent: an existing store is reattached as-is. The key
    /// policy is fixed at creation; reopening with a different policy fails
    /// with [`CoreError::StoreConfigMismatch`].
    ///
    /// Returns the store id and whether the store was newly created.
    pub fn open_store(&mut self, config: &StoreConfig) -> CoreResult<(StoreId, bool)> {
        let policy = KeyPolicy {
            key_path: config.key_path.clone(),
            auto_increment: config.auto_increment,
        };

        if let Some(def) = self.stores.get(&config.name) {
            if def.policy != policy {
                return Err(CoreError::StoreConfigMismatch {
                    name: config.name.clone(),
                });
            }
            return Ok((def.id, false));
        }

        let id = StoreId::new(self.next_store_id);
        self.next_store_id += 1;
        self.stores.insert(
            config.name.clone(),
            StoreDef {
                id,
                policy,
                next_surrogate: FIRST_SURROGATE,
            },
        );
        Ok((id, true))
    }

    /// Looks up a store id by name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<StoreId> {
        self.stores.get(name).map(|def| def.id)
    }

    /// Returns the definition for a store id.
    pub fn def(&self, id: StoreId) -> CoreResult<&StoreDef> {
        self.stores
            .values()
            .find(|def| def.id == id)
            .ok_or(CoreError::UnknownStore { id: id.as_u32() })
    }

    /// Allocates the next surrogate key for a store.
    ///
    /// Surrogates are strictly increasing per store. Keys consumed by a
    /// transaction that later aborts stay burned; gaps are permitted.
    pub fn allocate_surrogate(&mut self, id: StoreId) -> CoreResult<i64> {
        let def = self.def_mut(id)?;
        let key = def.next_surrogate;
        def.next_surrogate += 1;
        Ok(key)
    }

    /// Records a committed integer key so later surrogates stay above it.
    ///
    /// Called for explicit integer keys at write time and for every integer
    /// key seen during recovery, so explicit keys never collide with later
    /// generated ones and counters survive crashes.
    pub fn note_integer_key(&mut self, id: StoreId, key: i64) {
        if let Ok(def) = self.def_mut(id) {
            if def.policy.auto_increment && key >= def.next_surrogate {
                def.next_surrogate = key + 1;
            }
        }
    }

    /// Iterates over all store definitions.
    pub fn defs(&self) -> impl Iterator<Item = (&str, &StoreDef)> {
        self.stores.iter().map(|(name, def)| (name.as_str(), def))
    }

    fn def_mut(&mut self, id: StoreId) -> CoreResult<&mut StoreDef> {
        self.stores
            .values_mut()
            .find(|def| def.id == id)
            .ok_or(CoreError::UnknownStore { id: id.as_u32() })
    }

    /// Encodes the catalog to bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        buf.extend_from_slice(&CATALOG_MAGIC);
        buf.extend_from_slice(&CATALOG_VERSION.to_le_bytes());
        buf.extend_from_slice(&self.format_version.0.to_le_bytes());
        buf.extend_from_slice(&self.format_version.1.to_le_bytes());
        buf.extend_from_slice(&self.next_store_id.to_le_bytes());

        let count = u32::try_from(self.stores.len()).unwrap_or(u32::MAX);
        buf.extend_from_slice(&count.to_le_bytes());

        for (name, def) in &self.stores {
            let name_bytes = name.as_bytes();
            let name_len = u16::try_from(name_bytes.len()).unwrap_or(u16::MAX);
            buf.extend_from_slice(&name_len.to_le_bytes());
            buf.extend_from_slice(&name_bytes[..name_len as usize]);
            buf.extend_from_slice(&def.id.as_u32().to_le_bytes());

            match def.policy.key_path.as_deref() {
                Some(path) => {
                    buf.push(1);
                    let path_bytes = path.as_bytes();
                    let path_len = u16::try_from(path_bytes.len()).unwrap_or(u16::MAX);
                    buf.extend_from_slice(&path_len.to_le_bytes());
                    buf.extend_from_slice(&path_bytes[..path_len as usize]);
                }
                None => buf.push(0),
            }
            buf.push(u8::from(def.policy.auto_increment));
            buf.extend_from_slice(&def.next_surrogate.to_le_bytes());
        }

        match self.last_checkpoint {
            Some(seq) => {
                buf.push(1);
                buf.extend_from_slice(&seq.as_u64().to_le_bytes());
            }
            None => buf.push(0),
        }

        buf
    }

    /// Decodes a catalog from bytes.
    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        let mut cursor = Cursor::new(data);

        if cursor.take(4)? != CATALOG_MAGIC {
            return Err(CoreError::invalid_format("invalid catalog magic"));
        }

        let version = cursor.u16()?;
        if version > CATALOG_VERSION {
            return Err(CoreError::invalid_format(format!(
                "unsupported catalog version: {version}"
            )));
        }

        let format_version = (cursor.u16()?, cursor.u16()?);
        let next_store_id = cursor.u32()?;
        let store_count = cursor.u32()? as usize;

        let mut stores = HashMap::with_capacity(store_count);
        for _ in 0..store_count {
            let name_len = cursor.u16()? as usize;
            let name = std::str::from_utf8(cursor.take(name_len)?)
                .map_err(|_| CoreError::invalid_format("invalid store name"))?
                .to_string();
            let id = StoreId::new(cursor.u32()?);

            let key_path = if cursor.u8()? != 0 {
                let path_len = cursor.u16()? as usize;
                let path = std::str::from_utf8(cursor.take(path_len)?)
                    .map_err(|_| CoreError::invalid_format("invalid key path"))?;
                Some(path.to_string())
            } else {
                None
            };
            let auto_increment = cursor.u8()? != 0;
            let next_surrogate = cursor.i64()?;

            stores.insert(
                name,
                StoreDef {
                    id,
                    policy: KeyPolicy {
                        key_path,
                        auto_increment,
                    },
                    next_surrogate,
                },
            );
        }

        let last_checkpoint = if cursor.u8()? != 0 {
            Some(SequenceNumber::new(cursor.u64()?))
        } else {
            None
        };

        Ok(Self {
            format_version,
            stores,
            next_store_id,
            last_checkpoint,
        })
    }
}

/// Bounds-checked reader over the catalog bytes.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, len: usize) -> CoreResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| CoreError::invalid_format("catalog too short"))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> CoreResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> CoreResult<u16> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    fn u32(&mut self) -> CoreResult<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn u64(&mut self) -> CoreResult<u64> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn i64(&mut self) -> CoreResult<i64> {
        Ok(i64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_store_is_idempotent() {
        let mut catalog = Catalog::default();

        let (id1, created1) = catalog.open_store(&StoreConfig::new("users")).unwrap();
        let (id2, created2) = catalog.open_store(&StoreConfig::new("users")).unwrap();
        let (other, _) = catalog.open_store(&StoreConfig::new("posts")).unwrap();

        assert_eq!(id1, id2);
        assert!(created1);
        assert!(!created2);
        assert_ne!(id1, other);
    }

    #[test]
    fn reopening_with_different_policy_fails() {
        let mut catalog = Catalog::default();
        catalog.open_store(&StoreConfig::new("users")).unwrap();

        let result = catalog.open_store(&StoreConfig::new("users").out_of_line());
        assert!(matches!(
            result,
            Err(CoreError::StoreConfigMismatch { .. })
        ));
    }

    #[test]
    fn surrogates_are_strictly_increasing() {
        let mut catalog = Catalog::default();
        let (id, _) = catalog.open_store(&StoreConfig::new("users")).unwrap();

        let k1 = catalog.allocate_surrogate(id).unwrap();
        let k2 = catalog.allocate_surrogate(id).unwrap();
        assert_eq!(k1, 1);
        assert!(k2 > k1);
    }

    #[test]
    fn explicit_keys_push_the_counter_up() {
        let mut catalog = Catalog::default();
        let (id, _) = catalog.open_store(&StoreConfig::new("users")).unwrap();

        catalog.note_integer_key(id, 10);
        assert_eq!(catalog.allocate_surrogate(id).unwrap(), 11);

        // A smaller key never moves the counter backwards.
        catalog.note_integer_key(id, 3);
        assert_eq!(catalog.allocate_surrogate(id).unwrap(), 12);
    }

    #[test]
    fn note_integer_key_ignores_non_generating_stores() {
        let mut catalog = Catalog::default();
        let (id, _) = catalog
            .open_store(&StoreConfig::new("raw").out_of_line())
            .unwrap();

        catalog.note_integer_key(id, 100);
        assert_eq!(catalog.def(id).unwrap().next_surrogate, 1);
    }

    #[test]
    fn encode_decode_roundtrip() {
        let mut catalog = Catalog::new((1, 2));
        let (users, _) = catalog.open_store(&StoreConfig::new("users")).unwrap();
        catalog
            .open_store(&StoreConfig::new("raw").out_of_line())
            .unwrap();
        catalog.allocate_surrogate(users).unwrap();
        catalog.note_integer_key(users, 41);
        catalog.last_checkpoint = Some(SequenceNumber::new(17));

        let decoded = Catalog::decode(&catalog.encode()).unwrap();

        assert_eq!(decoded.format_version, catalog.format_version);
        assert_eq!(decoded.next_store_id, catalog.next_store_id);
        assert_eq!(decoded.last_checkpoint, catalog.last_checkpoint);
        assert_eq!(decoded.stores, catalog.stores);
        assert_eq!(decoded.def(users).unwrap().next_surrogate, 42);
    }

    #[test]
    fn invalid_magic_rejected() {
        assert!(Catalog::decode(b"XXXX").is_err());
    }

    #[test]
    fn truncated_catalog_rejected() {
        let catalog = Catalog::default();
        let encoded = catalog.encode();
        assert!(Catalog::decode(&encoded[..encoded.len() - 1]).is_err());
    }

    #[test]
    fn unknown_store_id_fails() {
        let catalog = Catalog::default();
        assert!(matches!(
            catalog.def(StoreId::new(9)),
            Err(CoreError::UnknownStore { id: 9 })
        ));
    }
}
