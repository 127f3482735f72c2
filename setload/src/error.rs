//! Error types for the set loading pipeline.
//!
//! Errors are layered the same way the run is:
//!
//! - [`ConfigError`] - bad run configuration, raised before anything is written
//! - [`InputError`] - the input file cannot be read or tokenized
//! - [`LineError`] - one input line is unusable (structural or unresolved key)
//! - [`SnapshotError`] - the store snapshot cannot be loaded
//! - [`EmitError`] - a bulk-copy stream cannot be written
//! - [`LoaderError`] - the external bulk loader failed
//! - [`PipelineError`] - top-level, wraps everything above
//!
//! `From` conversions let `?` cross those boundaries. [`LineError`] is the
//! only recoverable kind; it is recorded in the error file and the run moves
//! on, unless the input contract says malformed lines are fatal.

use std::path::PathBuf;
use thiserror::Error;

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors in the run configuration. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Mode is neither `preview` nor `load`.
    #[error("Invalid Processing Mode: {0}")]
    InvalidMode(String),

    /// A required setting was not given on the command line or in the environment.
    #[error("Missing required setting: {0}")]
    MissingSetting(&'static str),

    /// The input file does not exist.
    #[error("Input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    /// The input contract is inconsistent.
    #[error("Invalid input contract: {0}")]
    InvalidContract(String),

    /// A contract file could not be read.
    #[error("Could not read contract file {}: {source}", path.display())]
    ContractFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A contract file is not valid JSON.
    #[error("Invalid contract JSON: {0}")]
    ContractJson(#[from] serde_json::Error),

    /// The date format contains an unknown specifier.
    #[error("Invalid date format: {0}")]
    InvalidDateFormat(String),
}

// =============================================================================
// Input Errors
// =============================================================================

/// Errors while reading and tokenizing the input file.
#[derive(Debug, Error)]
pub enum InputError {
    /// Failed to read the file.
    #[error("Could not read input: {0}")]
    Io(#[from] std::io::Error),

    /// The tokenizer gave up on the content.
    #[error("Could not tokenize input at line {line}: {message}")]
    Tokenize { line: usize, message: String },
}

// =============================================================================
// Line Errors (recoverable)
// =============================================================================

/// Which lookup failed for a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    User,
    Type,
    Object,
}

impl std::fmt::Display for LookupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LookupKind::User => "User",
            LookupKind::Type => "MGI Type",
            LookupKind::Object => "Object",
        };
        f.write_str(name)
    }
}

/// A problem confined to one input line.
///
/// The `Display` form is exactly what goes into the error file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
    /// Wrong number of fields.
    #[error("Invalid Line ({line}): expected {expected} fields, found {found}: {text}")]
    Structural {
        line: usize,
        expected: usize,
        found: usize,
        text: String,
    },

    /// A name or identifier did not resolve to a key.
    #[error("Invalid {kind} ({line}): {value}")]
    Unresolved {
        line: usize,
        kind: LookupKind,
        value: String,
    },
}

impl LineError {
    /// Line number the error refers to (1-based).
    pub fn line(&self) -> usize {
        match self {
            LineError::Structural { line, .. } | LineError::Unresolved { line, .. } => *line,
        }
    }
}

// =============================================================================
// Snapshot Errors
// =============================================================================

/// Errors while loading the store snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Failed to read the file.
    #[error("Could not read snapshot: {0}")]
    Io(#[from] std::io::Error),

    /// Not valid snapshot JSON.
    #[error("Invalid snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// An existing set names a type the snapshot does not define.
    #[error("Set '{set}' (key {key}) has unknown type '{set_type}'")]
    UnknownSetType {
        set: String,
        key: u64,
        set_type: String,
    },
}

// =============================================================================
// Emit Errors
// =============================================================================

/// Errors while writing the bulk-copy streams.
#[derive(Debug, Error)]
pub enum EmitError {
    /// Underlying stream failed.
    #[error("Write failed: {0}")]
    Io(#[from] std::io::Error),

    /// The CSV writer failed.
    #[error("Write failed: {0}")]
    Csv(#[from] csv::Error),

    /// A value would break the row layout of the bulk file.
    #[error("Value for '{column}' contains a delimiter: {value:?}")]
    UnsafeValue { column: &'static str, value: String },

    /// A timestamp could not be rendered with the configured format.
    #[error("Could not format date with '{0}'")]
    DateFormat(String),
}

// =============================================================================
// Loader Errors
// =============================================================================

/// Errors from the external bulk loader.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// The loader process could not be started.
    #[error("Could not start bulk loader: {0}")]
    Spawn(#[from] std::io::Error),

    /// The loader exited unsuccessfully.
    #[error("Bulk load of {table} failed ({status})")]
    Failed { table: String, status: String },

    /// Members must be purged but no purge command was configured.
    #[error("Superseded members of {0} need a purge command")]
    NoPurgeCommand(String),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level error for a run. Every variant is fatal.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Input error.
    #[error("Input error: {0}")]
    Input(#[from] InputError),

    /// A malformed line under a contract that does not tolerate them.
    #[error("{0}")]
    Malformed(LineError),

    /// Snapshot error.
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// Emit error.
    #[error("Output error: {0}")]
    Emit(#[from] EmitError),

    /// Loader error.
    #[error("Loader error: {0}")]
    Loader(#[from] LoaderError),

    /// Diagnostics, error or report file could not be written.
    #[error("Could not write {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for configuration.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for emitting records.
pub type EmitResult<T> = Result<T, EmitError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let config_err = ConfigError::InvalidMode("dryrun".into());
        let pipeline_err: PipelineError = config_err.into();
        assert!(pipeline_err.to_string().contains("dryrun"));

        let emit_err = EmitError::DateFormat("%Q".into());
        let pipeline_err: PipelineError = emit_err.into();
        assert!(pipeline_err.to_string().contains("%Q"));
    }

    #[test]
    fn test_line_error_format() {
        let err = LineError::Unresolved {
            line: 12,
            kind: LookupKind::User,
            value: "jdoe".into(),
        };
        assert_eq!(err.to_string(), "Invalid User (12): jdoe");
        assert_eq!(err.line(), 12);

        let err = LineError::Structural {
            line: 4,
            expected: 5,
            found: 3,
            text: "a\tb\tc".into(),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("Invalid Line (4)"));
        assert!(msg.contains("expected 5 fields, found 3"));
    }

    #[test]
    fn test_malformed_keeps_line_message() {
        let err = PipelineError::Malformed(LineError::Structural {
            line: 2,
            expected: 4,
            found: 1,
            text: "x".into(),
        });
        assert!(err.to_string().starts_with("Invalid Line (2)"));
    }
}
