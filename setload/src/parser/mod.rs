//! Input parsing: decode the raw file, split it into lines and fields.
//!
//! Set listings come from older curation tools and are not always UTF-8, so
//! the encoding is detected first. Tokenizing is delegated to the `csv`
//! reader with quoting disabled: a field is exactly the bytes between two
//! delimiters.

use std::path::Path;

use crate::error::{InputError, LineError};

/// One non-blank line of input, split into fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    /// Physical line number (1-based).
    pub line: usize,
    pub fields: Vec<String>,
}

impl RawLine {
    /// Check the field count, turning a mismatch into a structural error.
    pub fn expect_width(self, expected: usize, delimiter: char) -> Result<RawLine, LineError> {
        if self.fields.len() == expected {
            return Ok(self);
        }
        Err(LineError::Structural {
            line: self.line,
            expected,
            found: self.fields.len(),
            text: self.fields.join(&delimiter.to_string()),
        })
    }
}

/// Decoded input with the encoding that was used.
#[derive(Debug, Clone)]
pub struct DecodedInput {
    pub content: String,
    pub encoding: String,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes using the given encoding. Unknown encodings fall back to
/// lossy UTF-8.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => {
            encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned()
        }
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => match std::str::from_utf8(bytes) {
            Ok(text) => text.to_string(),
            Err(_) => String::from_utf8_lossy(bytes).into_owned(),
        },
    }
}

/// Decode bytes with encoding auto-detection.
pub fn decode_auto(bytes: &[u8]) -> DecodedInput {
    // Valid UTF-8 wins outright; chardet guesses poorly on short ASCII files.
    if let Ok(text) = std::str::from_utf8(bytes) {
        return DecodedInput {
            content: text.to_string(),
            encoding: "utf-8".to_string(),
        };
    }
    let encoding = detect_encoding(bytes);
    DecodedInput {
        content: decode_content(bytes, &encoding),
        encoding,
    }
}

/// Read and decode an input file.
pub fn read_input<P: AsRef<Path>>(path: P) -> Result<DecodedInput, InputError> {
    let bytes = std::fs::read(path.as_ref())?;
    Ok(decode_auto(&bytes))
}

/// Split decoded content into lines of fields.
///
/// Lines are numbered by physical position, so blank lines are dropped but
/// still counted. A trailing `\r` is stripped. Each line is tokenized on its
/// own; field counts are not checked here, see [`RawLine::expect_width`].
pub fn split_lines(content: &str, delimiter: char) -> Result<Vec<RawLine>, InputError> {
    let delimiter = u8::try_from(delimiter).map_err(|_| InputError::Tokenize {
        line: 0,
        message: format!("delimiter {:?} is not a single byte", delimiter),
    })?;

    let mut builder = csv::ReaderBuilder::new();
    builder
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .terminator(csv::Terminator::Any(b'\n'));

    let mut lines = Vec::new();
    for (index, text) in content.split('\n').enumerate() {
        let text = text.strip_suffix('\r').unwrap_or(text);
        if text.is_empty() {
            continue;
        }
        let line = index + 1;

        let mut record = csv::StringRecord::new();
        builder
            .from_reader(text.as_bytes())
            .read_record(&mut record)
            .map_err(|e| InputError::Tokenize {
                line,
                message: e.to_string(),
            })?;
        lines.push(RawLine {
            line,
            fields: record.iter().map(str::to_string).collect(),
        });
    }

    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_tab_lines() {
        let content = "geneA\tLabelX\tCloneSet\tSource\tuser1\ngeneB\tLabelY\tCloneSet\tSource\tuser1\n";
        let lines = split_lines(content, '\t').unwrap();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].line, 1);
        assert_eq!(lines[1].line, 2);
        assert_eq!(lines[1].fields[0], "geneB");
        assert_eq!(lines[1].fields.len(), 5);
    }

    #[test]
    fn test_blank_lines_keep_physical_numbers() {
        let lines = split_lines("a\tb\n\n\nc\td\n", '\t').unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].line, 1);
        assert_eq!(lines[1].line, 4);
        assert_eq!(lines[1].fields, vec!["c", "d"]);

        let lines = split_lines("a\r\n\r\nb\tc\r\n", '\t').unwrap();
        assert_eq!(lines[1].line, 3);
        assert_eq!(lines[1].fields, vec!["b", "c"]);
    }

    #[test]
    fn test_quotes_are_literal() {
        let lines = split_lines("\"quoted\tname\"\n", '\t').unwrap();
        assert_eq!(lines[0].fields, vec!["\"quoted", "name\""]);
    }

    #[test]
    fn test_empty_fields_kept() {
        let lines = split_lines("Pax6\t\n", '\t').unwrap();
        assert_eq!(lines[0].fields, vec!["Pax6", ""]);
    }

    #[test]
    fn test_crlf_terminators() {
        let lines = split_lines("a\tb\r\nc\td\r\n", '\t').unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].fields, vec!["a", "b"]);
        assert_eq!(lines[1].fields, vec!["c", "d"]);
    }

    #[test]
    fn test_expect_width_mismatch() {
        let line = RawLine {
            line: 3,
            fields: vec!["a".into(), "b".into(), "c".into()],
        };
        let err = line.expect_width(5, '\t').unwrap_err();

        assert_eq!(err.line(), 3);
        assert!(matches!(
            err,
            LineError::Structural {
                expected: 5,
                found: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_expect_width_match() {
        let line = RawLine {
            line: 1,
            fields: vec!["a".into(), "b".into()],
        };
        assert!(line.expect_width(2, '\t').is_ok());
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1");
        assert_eq!(decoded, "Société");
    }

    #[test]
    fn test_decode_auto_prefers_utf8() {
        let decoded = decode_auto("Société\tx".as_bytes());
        assert_eq!(decoded.encoding, "utf-8");
        assert_eq!(decoded.content, "Société\tx");
    }

    #[test]
    fn test_read_input_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("set.txt");
        std::fs::write(&path, "m\tl\n").unwrap();

        let decoded = read_input(&path).unwrap();
        assert_eq!(decoded.content, "m\tl\n");
    }
}
