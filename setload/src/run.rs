//! One complete run: read the listing, assemble records, write the bulk
//! files and, in load mode, hand them to the bulk loader.
//!
//! # Example
//!
//! ```rust,ignore
//! use setload::{run_setload, CommandLoader, RunSettings, SnapshotStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RunSettings {
//!         mode: Some("preview".into()),
//!         input: Some("sets.txt".into()),
//!         snapshot: Some("store.json".into()),
//!         ..Default::default()
//!     }
//!     .resolve()?;
//!     let store = SnapshotStore::from_file(&config.snapshot)?;
//!     let report = run_setload(&config, &store, None::<&CommandLoader>).await?;
//!     println!("{} members written", report.members_written);
//!     Ok(())
//! }
//! ```

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use uuid::Uuid;

use crate::assemble::{AssemblyReport, SetAssembler};
use crate::config::{RunConfig, SET_MEMBER_TABLE, SET_TABLE};
use crate::diagnostics::{DiagnosticsFile, ErrorSink};
use crate::emit::{write_key_list, RecordEmitter};
use crate::error::{ConfigError, PipelineError, PipelineResult};
use crate::loader::{BulkFile, BulkLoader, RunMode};
use crate::logs::{log_info, log_info_indent, log_success, log_warning};
use crate::lookup::{Resolver, StoreCatalog};
use crate::parser::{read_input, split_lines, RawLine};

/// Outcome of a finished run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: Uuid,
    pub mode: RunMode,
    pub contract: String,
    pub input: PathBuf,
    pub encoding: String,
    #[serde(flatten)]
    pub assembly: AssemblyReport,
    pub sets_written: usize,
    pub members_written: usize,
    /// Files produced in the output directory.
    pub files: Vec<PathBuf>,
    /// Messages written to the error file.
    pub errors: Vec<String>,
    /// Whether the bulk loader ran.
    pub loaded: bool,
}

/// Run the whole pipeline for `config`.
///
/// The diagnostics file is always finished, fatal error or not. The bulk
/// loader is only reached in load mode, after both bulk files are closed
/// and only if nothing fatal happened before.
pub async fn run_setload<S, L>(
    config: &RunConfig,
    store: &S,
    loader: Option<&L>,
) -> PipelineResult<RunReport>
where
    S: Resolver + StoreCatalog + ?Sized,
    L: BulkLoader,
{
    fs::create_dir_all(&config.output_dir).map_err(|source| PipelineError::File {
        path: config.output_dir.clone(),
        source,
    })?;

    let run_id = Uuid::new_v4();
    let mut diagnostics = DiagnosticsFile::create(config.diagnostics_path())?;

    let result = execute(config, store, loader, run_id, &mut diagnostics).await;
    match result {
        Ok(report) => {
            diagnostics.finish()?;
            Ok(report)
        }
        Err(err) => {
            // The run error is what matters; a failing diagnostics file cannot add to it.
            diagnostics
                .line(format!("Fatal Error: {}", err))
                .and_then(|()| diagnostics.finish())
                .ok();
            Err(err)
        }
    }
}

async fn execute<S, L>(
    config: &RunConfig,
    store: &S,
    loader: Option<&L>,
    run_id: Uuid,
    diagnostics: &mut DiagnosticsFile,
) -> PipelineResult<RunReport>
where
    S: Resolver + StoreCatalog + ?Sized,
    L: BulkLoader,
{
    diagnostics.setting("Run ID", run_id)?;
    diagnostics.setting("Server", config.server.as_deref().unwrap_or("-"))?;
    diagnostics.setting("Database", config.database.as_deref().unwrap_or("-"))?;
    diagnostics.setting("Processing Mode", config.mode)?;
    diagnostics.setting("Input Contract", &config.contract.name)?;
    diagnostics.setting("Input File", config.input.display())?;
    diagnostics.setting("Output Directory", config.output_dir.display())?;

    // 1. Read and split
    log_info(format!("📄 Reading {}", config.input.display()));
    let decoded = read_input(&config.input)?;
    let lines = split_lines(&decoded.content, config.contract.delimiter)?;
    log_info_indent(
        format!("{} lines, encoding {}", lines.len(), decoded.encoding),
        1,
    );

    // 2. Assemble into the bulk files
    let set_file = config.bulk_file(SET_TABLE);
    let member_file = config.bulk_file(SET_MEMBER_TABLE);
    let stamp = Local::now().naive_local();

    let mut errors = ErrorSink::create(config.error_path())?;
    let assembled = assemble(config, store, lines, stamp, &set_file, &member_file, &mut errors);
    if let Err(PipelineError::Malformed(line)) = &assembled {
        errors.record(line.clone());
    }
    let line_errors = errors.finish();
    let (assembly, sets_written, members_written) = assembled?;
    let line_errors = line_errors?;

    log_success(format!(
        "Wrote {} sets and {} members ({} lines rejected)",
        sets_written,
        members_written,
        line_errors.len()
    ));
    if !line_errors.is_empty() {
        log_warning(format!(
            "{} lines rejected, see {}",
            line_errors.len(),
            config.error_path().display()
        ));
    }

    let mut files = vec![set_file.path(), member_file.path()];

    // 3. Superseded memberships
    let supersede = if assembly.superseded.is_empty() {
        None
    } else {
        let file = config.supersede_file();
        write_supersede(&file, &assembly.superseded)?;
        log_info_indent(
            format!("{} existing sets superseded", assembly.superseded.len()),
            1,
        );
        files.push(file.path());
        Some(file)
    };

    // 4. Bulk load
    let loaded = match config.mode {
        RunMode::Load => {
            let loader = loader.ok_or(ConfigError::MissingSetting("loader command"))?;
            if let Some(file) = &supersede {
                diagnostics.line(loader.describe(file))?;
                loader.purge_members(file).await?;
            }
            for file in [&set_file, &member_file] {
                diagnostics.line(loader.describe(file))?;
                log_info(format!("📤 Loading {}", file.table));
                loader.load(file).await?;
            }
            log_success("Bulk load complete");
            true
        }
        RunMode::Preview => {
            log_info("Preview mode, bulk loader not invoked");
            false
        }
    };

    let report = RunReport {
        run_id,
        mode: config.mode,
        contract: config.contract.name.clone(),
        input: config.input.clone(),
        encoding: decoded.encoding,
        assembly,
        sets_written,
        members_written,
        files,
        errors: line_errors.iter().map(ToString::to_string).collect(),
        loaded,
    };

    if let Some(path) = &config.report {
        write_report(path, &report)?;
    }

    Ok(report)
}

fn assemble<S>(
    config: &RunConfig,
    store: &S,
    lines: Vec<RawLine>,
    stamp: NaiveDateTime,
    set_file: &BulkFile,
    member_file: &BulkFile,
    errors: &mut ErrorSink,
) -> PipelineResult<(AssemblyReport, usize, usize)>
where
    S: Resolver + StoreCatalog + ?Sized,
{
    let set_path = set_file.path();
    let member_path = member_file.path();

    let mut emitter = RecordEmitter::new(
        create(&set_path)?,
        create(&member_path)?,
        config.delimiters,
        config.date_format.as_str(),
    )?;
    let mut assembler =
        SetAssembler::new(store, config.contract.clone(), config.layout.clone(), stamp);
    assembler.run(lines, &mut emitter, errors)?;

    let sets_written = emitter.sets_written();
    let members_written = emitter.members_written();
    let (sets, members) = emitter.finish()?;
    close(sets, &set_path)?;
    close(members, &member_path)?;

    Ok((assembler.report(), sets_written, members_written))
}

fn file_error(path: &Path) -> impl FnOnce(std::io::Error) -> PipelineError + '_ {
    move |source| PipelineError::File {
        path: path.to_path_buf(),
        source,
    }
}

fn create(path: &Path) -> PipelineResult<BufWriter<File>> {
    File::create(path).map(BufWriter::new).map_err(file_error(path))
}

fn close(out: BufWriter<File>, path: &Path) -> PipelineResult<()> {
    out.into_inner()
        .map_err(|e| e.into_error())
        .and_then(|file| file.sync_all())
        .map_err(file_error(path))
}

fn write_supersede(file: &BulkFile, keys: &[u64]) -> PipelineResult<()> {
    let path = file.path();
    let out = create(&path)?;
    write_key_list(out, keys, file.delimiters.record).map_err(file_error(&path))
}

fn write_report(path: &Path, report: &RunReport) -> PipelineResult<()> {
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| file_error(path)(std::io::Error::other(e)))?;
    fs::write(path, json).map_err(file_error(path))
}
