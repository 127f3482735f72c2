//! # Setload - Set and SetMember bulk-file builder
//!
//! Setload reads a delimited listing of named sets and their members,
//! resolves every name to a store key, and writes the two bulk-copy files
//! the store ingests: one Set header per distinct set and one SetMember row
//! per accepted line.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ Set listing │────▶│   Parser    │────▶│  Assemble   │────▶│  .bcp files │
//! │ (ISO/UTF8)  │     │ (contract)  │     │ keys, dedup │     │  (+ loader) │
//! └─────────────┘     └─────────────┘     └──────┬──────┘     └─────────────┘
//!                                                │
//!                                         ┌──────▼──────┐
//!                                         │   Lookup    │
//!                                         │ (snapshot)  │
//!                                         └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use setload::{run_setload, CommandLoader, RunSettings, SnapshotStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = RunSettings {
//!         mode: Some("preview".into()),
//!         input: Some("sets.txt".into()),
//!         snapshot: Some("store.json".into()),
//!         ..Default::default()
//!     }
//!     .resolve()
//!     .unwrap();
//!     let store = SnapshotStore::from_file(&config.snapshot).unwrap();
//!     let report = run_setload(&config, &store, None::<&CommandLoader>).await.unwrap();
//!     println!("{} sets, {} members", report.sets_written, report.members_written);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Set and SetMember records
//! - [`contract`] - Input column layouts
//! - [`parser`] - Decoding and tokenizing
//! - [`lookup`] - Key resolution and store state
//! - [`assemble`] - Key allocation, dedup, per-line controller
//! - [`emit`] - Bulk-copy writers
//! - [`diagnostics`] - Error and diagnostics files
//! - [`config`] - Run configuration
//! - [`loader`] - Run mode and bulk loader
//! - [`run`] - The whole run
//! - [`sources`] - `expand-sources` companion
//! - [`logs`] - Console logging

// Core modules
pub mod error;
pub mod logs;
pub mod models;

// Input
pub mod contract;
pub mod parser;

// Assembly
pub mod assemble;
pub mod lookup;

// Output
pub mod diagnostics;
pub mod emit;

// Orchestration
pub mod config;
pub mod loader;
pub mod run;

// Companion
pub mod sources;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError,
    EmitError,
    InputError,
    LineError,
    LoaderError,
    LookupKind,
    PipelineError,
    PipelineResult,
    SnapshotError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{Key, SetIdentity, SetMemberRecord, SetRecord};

// =============================================================================
// Re-exports - Input
// =============================================================================

pub use contract::{
    Column,
    ExistingSetPolicy,
    InputContract,
    MalformedLinePolicy,
    RowLayout,
    SetDefaults,
    SetIdentityRule,
};

pub use parser::{decode_auto, read_input, split_lines, DecodedInput, RawLine};

// =============================================================================
// Re-exports - Lookup and assembly
// =============================================================================

pub use lookup::{Resolver, SnapshotStore, StoreCatalog, StoreSnapshot, UNRESOLVED};

pub use assemble::{
    AssemblyReport,
    KeyAllocator,
    LineOutcome,
    Rejection,
    SetAssembler,
    SetDeduplicator,
    SetResolution,
};

// =============================================================================
// Re-exports - Output
// =============================================================================

pub use diagnostics::{DiagnosticsFile, ErrorSink};
pub use emit::{Delimiters, RecordEmitter, DEFAULT_DATE_FORMAT};

// =============================================================================
// Re-exports - Orchestration
// =============================================================================

pub use config::{RunConfig, RunSettings, SET_MEMBER_TABLE, SET_TABLE};
pub use loader::{BulkFile, BulkLoader, CommandLoader, RunMode};
pub use run::{run_setload, RunReport};
pub use sources::{expand_sources, expand_sources_file, ExpandedSources};
