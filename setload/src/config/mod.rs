//! Run configuration.
//!
//! Command-line flags and their environment fallbacks arrive as
//! [`RunSettings`], where everything is optional. [`RunSettings::resolve`]
//! checks them and produces a [`RunConfig`]; nothing is opened for writing
//! until that has succeeded.

use std::path::PathBuf;

use chrono::format::{Item, StrftimeItems};

use crate::contract::{ExistingSetPolicy, InputContract, RowLayout, SetDefaults};
use crate::diagnostics::{DIAGNOSTICS_FILE_NAME, ERROR_FILE_NAME};
use crate::emit::{Delimiters, DEFAULT_DATE_FORMAT};
use crate::error::{ConfigError, ConfigResult};
use crate::loader::{BulkFile, RunMode};

/// Target table of set headers.
pub const SET_TABLE: &str = "MGI_Set";

/// Target table of set members.
pub const SET_MEMBER_TABLE: &str = "MGI_SetMember";

/// Suffix of the bulk-copy files.
pub const BULK_SUFFIX: &str = "bcp";

/// Suffix of the superseded set key list.
pub const SUPERSEDE_SUFFIX: &str = "supersede";

/// Unvalidated settings, as collected from flags and environment.
#[derive(Debug, Clone, Default)]
pub struct RunSettings {
    pub mode: Option<String>,
    pub input: Option<PathBuf>,
    pub snapshot: Option<PathBuf>,
    /// `A`, `B`, `C` or a path to a JSON contract. Defaults to `A`.
    pub contract: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub defaults: SetDefaults,
    pub date_format: Option<String>,
    pub loader_command: Option<PathBuf>,
    pub purge_command: Option<PathBuf>,
    pub server: Option<String>,
    pub database: Option<String>,
    pub report: Option<PathBuf>,
}

/// How the external bulk loader is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderSettings {
    pub command: PathBuf,
    pub purge_command: Option<PathBuf>,
}

/// A checked run configuration.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub mode: RunMode,
    pub input: PathBuf,
    pub snapshot: PathBuf,
    pub contract: InputContract,
    pub layout: RowLayout,
    pub output_dir: PathBuf,
    pub delimiters: Delimiters,
    pub date_format: String,
    /// Present in load mode.
    pub loader: Option<LoaderSettings>,
    pub server: Option<String>,
    pub database: Option<String>,
    pub report: Option<PathBuf>,
}

impl RunSettings {
    /// Validate every setting.
    ///
    /// The mode is checked first so an unknown mode fails before anything
    /// else is looked at.
    pub fn resolve(self) -> ConfigResult<RunConfig> {
        let mode: RunMode = self
            .mode
            .as_deref()
            .ok_or(ConfigError::MissingSetting("mode"))?
            .parse()?;

        let input = self.input.ok_or(ConfigError::MissingSetting("input file"))?;
        if !input.is_file() {
            return Err(ConfigError::InputNotFound(input));
        }
        let snapshot = self.snapshot.ok_or(ConfigError::MissingSetting("store snapshot"))?;

        let contract = InputContract::load(self.contract.as_deref().unwrap_or("A"))?;
        let layout = contract.layout(&self.defaults)?;

        let date_format = self
            .date_format
            .unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_string());
        check_date_format(&date_format)?;

        let loader = if mode.loads() {
            let command = self
                .loader_command
                .ok_or(ConfigError::MissingSetting("loader command"))?;
            if contract.existing_sets == ExistingSetPolicy::Reuse && self.purge_command.is_none() {
                return Err(ConfigError::MissingSetting("purge command"));
            }
            Some(LoaderSettings {
                command,
                purge_command: self.purge_command,
            })
        } else {
            None
        };

        Ok(RunConfig {
            mode,
            input,
            snapshot,
            delimiters: Delimiters::with_field(contract.delimiter),
            contract,
            layout,
            output_dir: self.output_dir.unwrap_or_else(|| PathBuf::from(".")),
            date_format,
            loader,
            server: self.server,
            database: self.database,
            report: self.report,
        })
    }
}

fn check_date_format(format: &str) -> ConfigResult<()> {
    if format.is_empty() || StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(ConfigError::InvalidDateFormat(format.to_string()));
    }
    Ok(())
}

impl RunConfig {
    /// Bulk file for `table` in the output directory.
    pub fn bulk_file(&self, table: &str) -> BulkFile {
        self.output_file(table, BULK_SUFFIX)
    }

    /// List of superseded set keys, handed to the purge step.
    pub fn supersede_file(&self) -> BulkFile {
        self.output_file(SET_MEMBER_TABLE, SUPERSEDE_SUFFIX)
    }

    pub fn error_path(&self) -> PathBuf {
        self.output_dir.join(ERROR_FILE_NAME)
    }

    pub fn diagnostics_path(&self) -> PathBuf {
        self.output_dir.join(DIAGNOSTICS_FILE_NAME)
    }

    fn output_file(&self, table: &str, suffix: &str) -> BulkFile {
        BulkFile {
            table: table.to_string(),
            directory: self.output_dir.clone(),
            file_name: format!("{}.{}", table, suffix),
            delimiters: self.delimiters,
        }
    }
}
