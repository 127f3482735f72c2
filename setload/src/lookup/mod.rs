//! Foreign-key resolution and store state.
//!
//! The pipeline never talks to the database directly. It sees two seams:
//!
//! - [`Resolver`] turns user names, type names and member identifiers into
//!   keys. A failed lookup writes its own line-numbered message to the
//!   [`ErrorSink`] and returns `None`.
//! - [`StoreCatalog`] answers what is already persisted: the highest keys
//!   handed out so far, sets that exist, and how many sets each type has.
//!
//! [`SnapshotStore`] implements both from a JSON snapshot of the store.

mod snapshot;

pub use snapshot::{SnapshotStore, StoreSnapshot, StoredSet};

use crate::diagnostics::ErrorSink;
use crate::models::Key;

/// Key value the store uses for "no row". Never handed downstream.
pub const UNRESOLVED: Key = 0;

/// Lookup service for the keys a line refers to.
///
/// All three lookups are idempotent.
pub trait Resolver {
    fn resolve_user(&self, name: &str, line: usize, errors: &mut ErrorSink) -> Option<Key>;

    fn resolve_type(&self, name: &str, line: usize, errors: &mut ErrorSink) -> Option<Key>;

    /// Resolve a member identifier among objects of `type_key`.
    fn resolve_object(
        &self,
        identifier: &str,
        type_key: Key,
        line: usize,
        errors: &mut ErrorSink,
    ) -> Option<Key>;
}

/// Persisted state the run starts from.
pub trait StoreCatalog {
    /// Highest set key in the store, `None` for an empty table.
    fn max_set_key(&self) -> Option<Key>;

    /// Highest set-member key in the store, `None` for an empty table.
    fn max_set_member_key(&self) -> Option<Key>;

    /// Key of an existing set with this type and name.
    fn existing_set(&self, type_key: Key, name: &str) -> Option<Key>;

    /// Highest set sequence number already used for `type_key` (0 if none).
    fn max_set_sequence(&self, type_key: Key) -> u32;
}
