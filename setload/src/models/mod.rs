//! Domain models for the set loading pipeline.
//!
//! - [`SetRecord`] - one row of the Set bulk file
//! - [`SetMemberRecord`] - one row of the SetMember bulk file
//! - [`SetIdentity`] - what makes two input lines name "the same set"

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Surrogate key as stored in the target tables.
pub type Key = u64;

// =============================================================================
// Set Identity
// =============================================================================

/// Identity of a set within a run.
///
/// Two lines with equal identities share one header record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SetIdentity {
    /// Set name alone; sets of different types with one name collapse.
    Name(String),
    /// Resolved type key plus name.
    Typed { type_key: Key, name: String },
}

// =============================================================================
// Records
// =============================================================================

/// A set header, written once per distinct set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetRecord {
    pub set_key: Key,
    pub type_key: Key,
    pub name: String,
    /// Position among sets of the same type (1-based).
    pub sequence_num: u32,
    pub created_by_key: Key,
    pub modified_by_key: Key,
    pub creation_date: NaiveDateTime,
    pub modification_date: NaiveDateTime,
}

impl SetRecord {
    /// New header; creation and modification fields start out equal.
    pub fn new(
        set_key: Key,
        type_key: Key,
        name: impl Into<String>,
        sequence_num: u32,
        created_by_key: Key,
        stamp: NaiveDateTime,
    ) -> Self {
        Self {
            set_key,
            type_key,
            name: name.into(),
            sequence_num,
            created_by_key,
            modified_by_key: created_by_key,
            creation_date: stamp,
            modification_date: stamp,
        }
    }
}

/// One membership row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetMemberRecord {
    pub set_member_key: Key,
    pub set_key: Key,
    pub member_object_key: Key,
    pub label: Option<String>,
    /// Position within the owning set (1-based).
    pub sequence_num: u32,
    pub created_by_key: Key,
    pub modified_by_key: Key,
    pub creation_date: NaiveDateTime,
    pub modification_date: NaiveDateTime,
}

impl SetMemberRecord {
    pub fn new(
        set_member_key: Key,
        set_key: Key,
        member_object_key: Key,
        label: Option<String>,
        sequence_num: u32,
        created_by_key: Key,
        stamp: NaiveDateTime,
    ) -> Self {
        Self {
            set_member_key,
            set_key,
            member_object_key,
            label,
            sequence_num,
            created_by_key,
            modified_by_key: created_by_key,
            creation_date: stamp,
            modification_date: stamp,
        }
    }
}
