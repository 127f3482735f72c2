//! Run-scoped diagnostics: the error file and the diagnostics file.
//!
//! Every rejected line lands in the [`ErrorSink`] keyed by its line number.
//! The [`DiagnosticsFile`] records how the run was configured, the commands
//! handed to the bulk loader and the start and end times.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{LineError, PipelineError};

/// Default error file name.
pub const ERROR_FILE_NAME: &str = "setload.error";

/// Default diagnostics file name.
pub const DIAGNOSTICS_FILE_NAME: &str = "setload.diagnostics";

fn timestamp() -> String {
    chrono::Local::now().format("%m/%d/%Y %H:%M:%S").to_string()
}

// =============================================================================
// Error sink
// =============================================================================

/// Collects recoverable line errors and mirrors them to an optional writer.
///
/// Lookups write into the sink from inside the pipeline where an I/O failure
/// cannot be returned, so the first write error is kept and reported by
/// [`ErrorSink::finish`].
pub struct ErrorSink {
    entries: Vec<LineError>,
    out: Option<Box<dyn Write>>,
    path: Option<PathBuf>,
    write_error: Option<io::Error>,
}

impl ErrorSink {
    /// A sink that only keeps entries in memory.
    pub fn in_memory() -> Self {
        Self {
            entries: Vec::new(),
            out: None,
            path: None,
            write_error: None,
        }
    }

    /// A sink backed by a new error file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|source| PipelineError::File {
            path: path.clone(),
            source,
        })?;
        let mut sink = Self {
            entries: Vec::new(),
            out: Some(Box::new(BufWriter::new(file))),
            path: Some(path),
            write_error: None,
        };
        sink.write_line(&format!("Start Date/Time: {}\n", timestamp()));
        Ok(sink)
    }

    /// Record one rejected line.
    pub fn record(&mut self, error: LineError) {
        self.write_line(&error.to_string());
        self.entries.push(error);
    }

    pub fn entries(&self) -> &[LineError] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn write_line(&mut self, line: &str) {
        if self.write_error.is_some() {
            return;
        }
        if let Some(out) = self.out.as_mut() {
            if let Err(e) = writeln!(out, "{}", line) {
                self.write_error = Some(e);
            }
        }
    }

    /// Write the end marker, flush, and surface any deferred write error.
    pub fn finish(mut self) -> Result<Vec<LineError>, PipelineError> {
        if self.out.is_some() {
            self.write_line(&format!("\n\nEnd Date/Time: {}", timestamp()));
            if let Some(out) = self.out.as_mut() {
                if let Err(e) = out.flush() {
                    if self.write_error.is_none() {
                        self.write_error = Some(e);
                    }
                }
            }
        }
        match (self.write_error, self.path) {
            (Some(source), Some(path)) => Err(PipelineError::File { path, source }),
            _ => Ok(self.entries),
        }
    }
}

impl std::fmt::Debug for ErrorSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorSink")
            .field("entries", &self.entries)
            .field("path", &self.path)
            .finish()
    }
}

// =============================================================================
// Diagnostics file
// =============================================================================

/// The diagnostics file of a run.
pub struct DiagnosticsFile {
    path: PathBuf,
    out: BufWriter<File>,
}

impl DiagnosticsFile {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|source| PipelineError::File {
            path: path.clone(),
            source,
        })?;
        let mut diagnostics = Self {
            path,
            out: BufWriter::new(file),
        };
        diagnostics.line(format!("Start Date/Time: {}", timestamp()))?;
        Ok(diagnostics)
    }

    /// Append one line.
    pub fn line(&mut self, text: impl AsRef<str>) -> Result<(), PipelineError> {
        writeln!(self.out, "{}", text.as_ref()).map_err(|source| self.file_error(source))
    }

    /// Append a `name: value` line.
    pub fn setting(&mut self, name: &str, value: impl std::fmt::Display) -> Result<(), PipelineError> {
        self.line(format!("{}: {}", name, value))
    }

    /// Write the end marker and flush.
    pub fn finish(mut self) -> Result<(), PipelineError> {
        self.line(format!("\n\nEnd Date/Time: {}", timestamp()))?;
        self.out.flush().map_err(|source| self.file_error(source))
    }

    fn file_error(&self, source: io::Error) -> PipelineError {
        PipelineError::File {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LookupKind;

    fn unresolved(line: usize) -> LineError {
        LineError::Unresolved {
            line,
            kind: LookupKind::Object,
            value: "geneZ".into(),
        }
    }

    #[test]
    fn test_in_memory_sink() {
        let mut sink = ErrorSink::in_memory();
        assert!(sink.is_empty());

        sink.record(unresolved(4));
        sink.record(unresolved(9));

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.entries()[1].line(), 9);
        assert_eq!(sink.finish().unwrap().len(), 2);
    }

    #[test]
    fn test_error_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(ERROR_FILE_NAME);

        let mut sink = ErrorSink::create(&path).unwrap();
        sink.record(unresolved(7));
        sink.finish().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("Start Date/Time:"));
        assert!(content.contains("Invalid Object (7): geneZ"));
        assert!(content.contains("End Date/Time:"));
    }

    #[test]
    fn test_diagnostics_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DIAGNOSTICS_FILE_NAME);

        let mut diagnostics = DiagnosticsFile::create(&path).unwrap();
        diagnostics.setting("Mode", "preview").unwrap();
        diagnostics.finish().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("Mode: preview"));
        assert!(content.contains("End Date/Time:"));
    }
}
