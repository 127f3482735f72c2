//! JSON snapshot of the target store.
//!
//! ```json
//! {
//!   "server": "PROD",
//!   "database": "mgd",
//!   "max_set_key": 41,
//!   "max_set_member_key": 1200,
//!   "users": { "user1": 1001 },
//!   "types": { "Source": 5 },
//!   "objects": { "Source": { "geneA": 101 } },
//!   "sets": [{ "key": 7, "type": "Source", "name": "Old", "sequence": 3 }]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use super::{Resolver, StoreCatalog, UNRESOLVED};
use crate::diagnostics::ErrorSink;
use crate::error::{LineError, LookupKind, SnapshotError};
use crate::models::Key;

/// Snapshot document as stored on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub server: String,

    #[serde(default)]
    pub database: String,

    #[serde(default)]
    pub max_set_key: Option<Key>,

    #[serde(default)]
    pub max_set_member_key: Option<Key>,

    /// User login → user key
    #[serde(default)]
    pub users: HashMap<String, Key>,

    /// Type name → type key
    #[serde(default)]
    pub types: HashMap<String, Key>,

    /// Type name → (identifier → object key)
    #[serde(default)]
    pub objects: HashMap<String, HashMap<String, Key>>,

    #[serde(default)]
    pub sets: Vec<StoredSet>,
}

/// A set that already exists in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSet {
    pub key: Key,
    #[serde(rename = "type")]
    pub set_type: String,
    pub name: String,
    #[serde(default)]
    pub sequence: u32,
}

impl StoreSnapshot {
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}

/// Indexed view of a [`StoreSnapshot`].
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    server: String,
    database: String,
    max_set_key: Option<Key>,
    max_set_member_key: Option<Key>,
    users: HashMap<String, Key>,
    types: HashMap<String, Key>,
    objects: HashMap<(Key, String), Key>,
    sets: HashMap<(Key, String), Key>,
    set_sequences: HashMap<Key, u32>,
}

impl SnapshotStore {
    /// Index a snapshot.
    ///
    /// Objects filed under a type the snapshot does not define are
    /// unreachable and dropped. Existing sets must name a defined type.
    pub fn new(snapshot: StoreSnapshot) -> Result<Self, SnapshotError> {
        let StoreSnapshot {
            server,
            database,
            max_set_key,
            max_set_member_key,
            users,
            types,
            objects,
            sets,
        } = snapshot;

        let mut indexed_objects = HashMap::new();
        for (type_name, members) in objects {
            let Some(&type_key) = types.get(&type_name) else {
                continue;
            };
            for (identifier, key) in members {
                indexed_objects.insert((type_key, identifier), key);
            }
        }

        let mut indexed_sets = HashMap::new();
        let mut set_sequences: HashMap<Key, u32> = HashMap::new();
        let mut highest_set = max_set_key;
        for set in sets {
            let type_key = *types
                .get(&set.set_type)
                .ok_or_else(|| SnapshotError::UnknownSetType {
                    set: set.name.clone(),
                    key: set.key,
                    set_type: set.set_type.clone(),
                })?;
            let sequence = set_sequences.entry(type_key).or_default();
            *sequence = (*sequence).max(set.sequence);
            highest_set = highest_set.max(Some(set.key));
            indexed_sets.insert((type_key, set.name), set.key);
        }

        Ok(Self {
            server,
            database,
            max_set_key: highest_set,
            max_set_member_key,
            users,
            types,
            objects: indexed_objects,
            sets: indexed_sets,
            set_sequences,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Self::new(StoreSnapshot::from_json(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        Self::new(StoreSnapshot::from_file(path)?)
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    fn found(
        key: Option<Key>,
        kind: LookupKind,
        value: &str,
        line: usize,
        errors: &mut ErrorSink,
    ) -> Option<Key> {
        match key.filter(|&k| k != UNRESOLVED) {
            Some(key) => Some(key),
            None => {
                errors.record(LineError::Unresolved {
                    line,
                    kind,
                    value: value.to_string(),
                });
                None
            }
        }
    }
}

impl Resolver for SnapshotStore {
    fn resolve_user(&self, name: &str, line: usize, errors: &mut ErrorSink) -> Option<Key> {
        Self::found(self.users.get(name).copied(), LookupKind::User, name, line, errors)
    }

    fn resolve_type(&self, name: &str, line: usize, errors: &mut ErrorSink) -> Option<Key> {
        Self::found(self.types.get(name).copied(), LookupKind::Type, name, line, errors)
    }

    fn resolve_object(
        &self,
        identifier: &str,
        type_key: Key,
        line: usize,
        errors: &mut ErrorSink,
    ) -> Option<Key> {
        let key = self.objects.get(&(type_key, identifier.to_string())).copied();
        Self::found(key, LookupKind::Object, identifier, line, errors)
    }
}

impl StoreCatalog for SnapshotStore {
    fn max_set_key(&self) -> Option<Key> {
        self.max_set_key
    }

    fn max_set_member_key(&self) -> Option<Key> {
        self.max_set_member_key
    }

    fn existing_set(&self, type_key: Key, name: &str) -> Option<Key> {
        self.sets.get(&(type_key, name.to_string())).copied()
    }

    fn max_set_sequence(&self, type_key: Key) -> u32 {
        self.set_sequences.get(&type_key).copied().unwrap_or(0)
    }
}
