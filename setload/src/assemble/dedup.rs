//! Run-scoped set deduplication.

use std::collections::HashMap;

use super::keys::KeyAllocator;
use crate::models::{Key, SetIdentity};

/// Outcome of resolving a set identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetResolution {
    /// First sighting; a new key was allocated and a header must be emitted.
    Created(Key),
    /// First sighting of a set already in the store; its members are superseded.
    Reused(Key),
    /// Seen earlier in this run.
    Known(Key),
}

impl SetResolution {
    pub fn key(&self) -> Key {
        match self {
            SetResolution::Created(key) | SetResolution::Reused(key) | SetResolution::Known(key) => {
                *key
            }
        }
    }
}

/// Maps set identities to the key they were given in this run.
#[derive(Debug, Clone, Default)]
pub struct SetDeduplicator {
    keys: HashMap<SetIdentity, Key>,
}

impl SetDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the key for `identity`, allocating one on first sighting.
    pub fn resolve(&mut self, identity: SetIdentity, allocator: &mut KeyAllocator) -> SetResolution {
        self.resolve_or_reuse(identity, allocator, None)
    }

    /// Like [`resolve`](Self::resolve), but a first sighting adopts `stored`
    /// when the store already holds the set.
    pub fn resolve_or_reuse(
        &mut self,
        identity: SetIdentity,
        allocator: &mut KeyAllocator,
        stored: Option<Key>,
    ) -> SetResolution {
        if let Some(&key) = self.keys.get(&identity) {
            return SetResolution::Known(key);
        }
        let resolution = match stored {
            Some(key) => SetResolution::Reused(key),
            None => SetResolution::Created(allocator.next_set_key()),
        };
        self.keys.insert(identity, resolution.key());
        resolution
    }

    /// Number of distinct sets seen.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
