//! `expand-sources`: turn a library → clone-set listing into set-first input.
//!
//! Each input line is `library<TAB>set1, set2, ...`. Every set name becomes
//! one line `set<TAB>type<TAB>library<TAB>createdBy`, ready to be loaded
//! with the set-first contract. A set list of `none` produces nothing.

use std::fs;
use std::path::Path;

use regex::Regex;
use serde::Serialize;

use crate::error::{InputError, LineError, PipelineError, PipelineResult};
use crate::parser::{read_input, split_lines};

/// Set list value meaning "no sets".
pub const NO_SETS: &str = "none";

/// Result of expanding a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpandedSources {
    pub lines: Vec<String>,
    pub libraries: usize,
    #[serde(skip)]
    pub errors: Vec<LineError>,
}

/// Expand decoded listing content.
pub fn expand_sources(
    content: &str,
    set_type: &str,
    created_by: &str,
) -> Result<ExpandedSources, InputError> {
    let separator = Regex::new(r"\s*,\s*").map_err(|e| InputError::Tokenize {
        line: 0,
        message: e.to_string(),
    })?;
    let mut expanded = ExpandedSources::default();

    for raw in split_lines(content, '\t')? {
        if raw.fields.len() < 2 {
            expanded.errors.push(LineError::Structural {
                line: raw.line,
                expected: 2,
                found: raw.fields.len(),
                text: raw.fields.join("\t"),
            });
            continue;
        }

        let library = raw.fields[0].trim();
        let sets = raw.fields[1].trim();
        expanded.libraries += 1;
        if sets == NO_SETS {
            continue;
        }

        for set in separator.split(sets).filter(|s| !s.is_empty()) {
            expanded
                .lines
                .push(format!("{}\t{}\t{}\t{}", set, set_type, library, created_by));
        }
    }

    Ok(expanded)
}

/// Expand `input` into `output`, one line per set.
pub fn expand_sources_file(
    input: &Path,
    output: &Path,
    set_type: &str,
    created_by: &str,
) -> PipelineResult<ExpandedSources> {
    let decoded = read_input(input)?;
    let expanded = expand_sources(&decoded.content, set_type, created_by)?;

    let mut text = expanded.lines.join("\n");
    if !text.is_empty() {
        text.push('\n');
    }
    fs::write(output, text).map_err(|source| PipelineError::File {
        path: output.to_path_buf(),
        source,
    })?;

    Ok(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_one_line_per_set() {
        let out = expand_sources("libA\tset1, set2 ,set3\n", "Source", "user1").unwrap();
        assert_eq!(
            out.lines,
            vec![
                "set1\tSource\tlibA\tuser1",
                "set2\tSource\tlibA\tuser1",
                "set3\tSource\tlibA\tuser1",
            ]
        );
        assert_eq!(out.libraries, 1);
        assert!(out.errors.is_empty());
    }

    #[test]
    fn test_empty_set_entries_skipped() {
        let out = expand_sources("libA\ts1,,s2 ,\n", "Source", "user1").unwrap();
        assert_eq!(
            out.lines,
            vec!["s1\tSource\tlibA\tuser1", "s2\tSource\tlibA\tuser1"]
        );
    }

    #[test]
    fn test_none_yields_nothing() {
        let out = expand_sources("libA\tnone\nlibB\tclones\n", "Source", "user1").unwrap();
        assert_eq!(out.lines, vec!["clones\tSource\tlibB\tuser1"]);
        assert_eq!(out.libraries, 2);
    }

    #[test]
    fn test_short_line_reported() {
        let out = expand_sources("libA\n\nlibB\tS\n", "Source", "user1").unwrap();
        assert_eq!(out.lines.len(), 1);
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].line(), 1);
        assert!(out.errors[0].to_string().starts_with("Invalid Line (1)"));
    }

    #[test]
    fn test_expand_file() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("sources.txt");
        let output = dir.path().join("sets.txt");
        fs::write(&input, "libA\ts1,s2\n").unwrap();

        let out = expand_sources_file(&input, &output, "Source", "user1").unwrap();

        assert_eq!(out.lines.len(), 2);
        assert_eq!(
            fs::read_to_string(output).unwrap(),
            "s1\tSource\tlibA\tuser1\ns2\tSource\tlibA\tuser1\n"
        );
    }
}
