//! Run mode and the external bulk loader.
//!
//! In `preview` mode the bulk files are written and left alone. In `load`
//! mode, once both files are closed, they are handed to a [`BulkLoader`]:
//! superseded memberships are purged first, then the Set table is loaded,
//! then the SetMember table.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use crate::emit::Delimiters;
use crate::error::{ConfigError, LoaderError};

// =============================================================================
// Run mode
// =============================================================================

/// Whether the run ends with a bulk load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Preview,
    Load,
}

impl RunMode {
    pub fn loads(&self) -> bool {
        matches!(self, RunMode::Load)
    }
}

impl FromStr for RunMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "preview" => Ok(RunMode::Preview),
            "load" => Ok(RunMode::Load),
            other => Err(ConfigError::InvalidMode(other.to_string())),
        }
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RunMode::Preview => "preview",
            RunMode::Load => "load",
        })
    }
}

// =============================================================================
// Bulk loader
// =============================================================================

/// A finished bulk file ready for ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkFile {
    pub table: String,
    pub directory: PathBuf,
    pub file_name: String,
    pub delimiters: Delimiters,
}

impl BulkFile {
    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }
}

/// Schema owning the target tables.
pub const BULK_SCHEMA: &str = "mgd";

/// Ingests finished bulk files into the store.
#[allow(async_fn_in_trait)]
pub trait BulkLoader {
    /// Command line (or equivalent) recorded in the diagnostics file.
    fn describe(&self, file: &BulkFile) -> String;

    /// Append the rows of `file` to its table.
    async fn load(&self, file: &BulkFile) -> Result<(), LoaderError>;

    /// Delete the stored members of every set key listed in `file`.
    async fn purge_members(&self, file: &BulkFile) -> Result<(), LoaderError>;
}

/// Runs an external bulk-copy script per file.
///
/// The script is called as
/// `command server database table directory file "\t" "\n" schema`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLoader {
    command: PathBuf,
    purge_command: Option<PathBuf>,
    server: String,
    database: String,
}

impl CommandLoader {
    pub fn new(command: impl Into<PathBuf>, server: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            purge_command: None,
            server: server.into(),
            database: database.into(),
        }
    }

    /// Script used to delete superseded memberships; same arguments.
    pub fn with_purge_command(mut self, command: impl Into<PathBuf>) -> Self {
        self.purge_command = Some(command.into());
        self
    }

    fn args(&self, file: &BulkFile) -> Vec<String> {
        vec![
            self.server.clone(),
            self.database.clone(),
            file.table.clone(),
            file.directory.display().to_string(),
            file.file_name.clone(),
            Delimiters::escaped(file.delimiters.field),
            Delimiters::escaped(file.delimiters.record),
            BULK_SCHEMA.to_string(),
        ]
    }

    async fn invoke(&self, program: &PathBuf, file: &BulkFile) -> Result<(), LoaderError> {
        let status = tokio::process::Command::new(program)
            .args(self.args(file))
            .status()
            .await?;
        if status.success() {
            Ok(())
        } else {
            Err(LoaderError::Failed {
                table: file.table.clone(),
                status: status.to_string(),
            })
        }
    }
}

impl BulkLoader for CommandLoader {
    fn describe(&self, file: &BulkFile) -> String {
        let args: Vec<String> = self
            .args(file)
            .into_iter()
            .map(|arg| if arg.starts_with('\\') { format!("\"{}\"", arg) } else { arg })
            .collect();
        format!("{} {}", self.command.display(), args.join(" "))
    }

    async fn load(&self, file: &BulkFile) -> Result<(), LoaderError> {
        self.invoke(&self.command, file).await
    }

    async fn purge_members(&self, file: &BulkFile) -> Result<(), LoaderError> {
        match &self.purge_command {
            Some(program) => self.invoke(program, file).await,
            None => Err(LoaderError::NoPurgeCommand(file.table.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bulk_file() -> BulkFile {
        BulkFile {
            table: "MGI_Set".into(),
            directory: PathBuf::from("/data/loads"),
            file_name: "MGI_Set.bcp".into(),
            delimiters: Delimiters::default(),
        }
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!("preview".parse::<RunMode>().unwrap(), RunMode::Preview);
        assert_eq!("load".parse::<RunMode>().unwrap(), RunMode::Load);
        assert!(RunMode::Load.loads());
        assert!(!RunMode::Preview.loads());
    }

    #[test]
    fn test_invalid_mode() {
        let err = "LOAD".parse::<RunMode>().unwrap_err();
        assert_eq!(err.to_string(), "Invalid Processing Mode: LOAD");
    }

    #[test]
    fn test_describe_command() {
        let loader = CommandLoader::new("/opt/bcpin.csh", "PROD", "mgd");
        assert_eq!(
            loader.describe(&bulk_file()),
            "/opt/bcpin.csh PROD mgd MGI_Set /data/loads MGI_Set.bcp \"\\t\" \"\\n\" mgd"
        );
        assert_eq!(bulk_file().path(), PathBuf::from("/data/loads/MGI_Set.bcp"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_exit_status() {
        let file = bulk_file();

        assert!(CommandLoader::new("true", "s", "d").load(&file).await.is_ok());

        let err = CommandLoader::new("false", "s", "d").load(&file).await.unwrap_err();
        assert!(matches!(err, LoaderError::Failed { ref table, .. } if table == "MGI_Set"));
    }

    #[tokio::test]
    async fn test_purge_needs_command() {
        let loader = CommandLoader::new("true", "s", "d");
        let err = loader.purge_members(&bulk_file()).await.unwrap_err();
        assert!(matches!(err, LoaderError::NoPurgeCommand(_)));
    }
}
