//! Set assembly: from input lines to keyed Set and SetMember records.
//!
//! ```text
//!  RawLine ──▶ width check ──▶ user / type / object lookup ──▶ set identity
//!                  │                       │                       │
//!             skip or abort          reject line            SetDeduplicator
//!                                                                  │
//!                                           header (first sighting) + member
//! ```
//!
//! - [`keys`] - the two surrogate key counters
//! - [`dedup`] - identity → set key map for the run
//! - [`controller`] - the per-line state machine

pub mod controller;
pub mod dedup;
pub mod keys;

pub use controller::{AssemblyReport, LineOutcome, Rejection, SetAssembler};
pub use dedup::{SetDeduplicator, SetResolution};
pub use keys::KeyAllocator;
