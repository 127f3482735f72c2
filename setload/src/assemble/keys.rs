//! Surrogate key allocation.

use std::ops::Range;

use crate::lookup::StoreCatalog;
use crate::models::Key;

/// Hands out set and set-member keys for one run.
///
/// Both counters only move forward by one per allocation, so the keys of a
/// run form two contiguous ranges starting at the seeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAllocator {
    first_set_key: Key,
    next_set_key: Key,
    first_member_key: Key,
    next_member_key: Key,
}

impl KeyAllocator {
    pub fn new(first_set_key: Key, first_member_key: Key) -> Self {
        Self {
            first_set_key,
            next_set_key: first_set_key,
            first_member_key,
            next_member_key: first_member_key,
        }
    }

    /// Seed both counters one past the store's current maximum, or at 1
    /// when the table is empty.
    pub fn seeded<C: StoreCatalog + ?Sized>(catalog: &C) -> Self {
        let next = |max: Option<Key>| max.map_or(1, |k| k + 1);
        Self::new(next(catalog.max_set_key()), next(catalog.max_set_member_key()))
    }

    pub fn next_set_key(&mut self) -> Key {
        let key = self.next_set_key;
        self.next_set_key += 1;
        key
    }

    pub fn next_member_key(&mut self) -> Key {
        let key = self.next_member_key;
        self.next_member_key += 1;
        key
    }

    /// Set keys handed out so far.
    pub fn set_keys(&self) -> Range<Key> {
        self.first_set_key..self.next_set_key
    }

    /// Set-member keys handed out so far.
    pub fn member_keys(&self) -> Range<Key> {
        self.first_member_key..self.next_member_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Catalog(Option<Key>, Option<Key>);

    impl StoreCatalog for Catalog {
        fn max_set_key(&self) -> Option<Key> {
            self.0
        }
        fn max_set_member_key(&self) -> Option<Key> {
            self.1
        }
        fn existing_set(&self, _type_key: Key, _name: &str) -> Option<Key> {
            None
        }
        fn max_set_sequence(&self, _type_key: Key) -> u32 {
            0
        }
    }

    #[test]
    fn test_seed_from_store_maximum() {
        let mut keys = KeyAllocator::seeded(&Catalog(Some(41), Some(1200)));
        assert_eq!(keys.next_set_key(), 42);
        assert_eq!(keys.next_member_key(), 1201);
    }

    #[test]
    fn test_seed_empty_store() {
        let mut keys = KeyAllocator::seeded(&Catalog(None, None));
        assert_eq!(keys.next_set_key(), 1);
        assert_eq!(keys.next_member_key(), 1);
    }

    #[test]
    fn test_counters_are_independent_and_contiguous() {
        let mut keys = KeyAllocator::new(10, 100);

        assert_eq!(keys.next_member_key(), 100);
        assert_eq!(keys.next_member_key(), 101);
        assert_eq!(keys.next_set_key(), 10);
        assert_eq!(keys.next_member_key(), 102);

        assert_eq!(keys.set_keys(), 10..11);
        assert_eq!(keys.member_keys(), 100..103);
    }

    #[test]
    fn test_nothing_allocated() {
        let keys = KeyAllocator::new(5, 5);
        assert!(keys.set_keys().is_empty());
        assert!(keys.member_keys().is_empty());
    }
}
