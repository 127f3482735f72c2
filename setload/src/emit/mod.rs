//! Bulk-copy stream writers.
//!
//! Column order is fixed by the target tables:
//!
//! ```text
//! MGI_Set        _Set_key  _MGIType_key  name  sequenceNum
//!                _CreatedBy_key  _ModifiedBy_key  creation_date  modification_date
//! MGI_SetMember  _SetMember_key  _Set_key  _Object_key  label  sequenceNum
//!                _CreatedBy_key  _ModifiedBy_key  creation_date  modification_date
//! ```
//!
//! Values are written unquoted, so a value holding a delimiter is refused
//! rather than silently splitting a row.

use std::fmt::Write as _;
use std::io::{self, Write};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{EmitError, EmitResult};
use crate::models::{SetMemberRecord, SetRecord};

/// Default timestamp format of the bulk files.
pub const DEFAULT_DATE_FORMAT: &str = "%m/%d/%Y";

/// Field and record delimiters of a bulk file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delimiters {
    pub field: char,
    pub record: char,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            field: '\t',
            record: '\n',
        }
    }
}

impl Delimiters {
    /// Same record terminator, custom field delimiter.
    pub fn with_field(field: char) -> Self {
        Self {
            field,
            ..Self::default()
        }
    }

    /// Escaped form as passed to the bulk loader (`\t`, `\n`).
    pub fn escaped(c: char) -> String {
        c.escape_default().to_string()
    }

    fn bytes(&self) -> EmitResult<(u8, u8)> {
        let byte = |c: char, column: &'static str| {
            u8::try_from(c).ok().filter(u8::is_ascii).ok_or(EmitError::UnsafeValue {
                column,
                value: c.to_string(),
            })
        };
        Ok((byte(self.field, "field delimiter")?, byte(self.record, "record delimiter")?))
    }
}

/// Writes Set and SetMember rows to their streams, in call order.
pub struct RecordEmitter<S: Write, M: Write> {
    sets: csv::Writer<S>,
    members: csv::Writer<M>,
    delimiters: Delimiters,
    date_format: String,
    sets_written: usize,
    members_written: usize,
}

impl<S: Write, M: Write> RecordEmitter<S, M> {
    pub fn new(
        sets: S,
        members: M,
        delimiters: Delimiters,
        date_format: impl Into<String>,
    ) -> EmitResult<Self> {
        let (field, record) = delimiters.bytes()?;
        let builder = || {
            let mut builder = csv::WriterBuilder::new();
            builder
                .delimiter(field)
                .terminator(csv::Terminator::Any(record))
                .quote_style(csv::QuoteStyle::Never);
            builder
        };
        Ok(Self {
            sets: builder().from_writer(sets),
            members: builder().from_writer(members),
            delimiters,
            date_format: date_format.into(),
            sets_written: 0,
            members_written: 0,
        })
    }

    pub fn emit_set(&mut self, set: &SetRecord) -> EmitResult<()> {
        self.check("name", &set.name)?;
        let row = [
            set.set_key.to_string(),
            set.type_key.to_string(),
            set.name.clone(),
            set.sequence_num.to_string(),
            set.created_by_key.to_string(),
            set.modified_by_key.to_string(),
            self.date(&set.creation_date)?,
            self.date(&set.modification_date)?,
        ];
        self.sets.write_record(&row)?;
        self.sets_written += 1;
        Ok(())
    }

    pub fn emit_member(&mut self, member: &SetMemberRecord) -> EmitResult<()> {
        let label = member.label.clone().unwrap_or_default();
        self.check("label", &label)?;
        let row = [
            member.set_member_key.to_string(),
            member.set_key.to_string(),
            member.member_object_key.to_string(),
            label,
            member.sequence_num.to_string(),
            member.created_by_key.to_string(),
            member.modified_by_key.to_string(),
            self.date(&member.creation_date)?,
            self.date(&member.modification_date)?,
        ];
        self.members.write_record(&row)?;
        self.members_written += 1;
        Ok(())
    }

    pub fn sets_written(&self) -> usize {
        self.sets_written
    }

    pub fn members_written(&self) -> usize {
        self.members_written
    }

    /// Flush both streams and hand them back.
    pub fn finish(mut self) -> EmitResult<(S, M)> {
        self.sets.flush()?;
        self.members.flush()?;
        let sets = self.sets.into_inner().map_err(|e| io::Error::other(e.to_string()))?;
        let members = self.members.into_inner().map_err(|e| io::Error::other(e.to_string()))?;
        Ok((sets, members))
    }

    fn check(&self, column: &'static str, value: &str) -> EmitResult<()> {
        if value.contains(self.delimiters.field)
            || value.contains(self.delimiters.record)
            || value.contains('\r')
        {
            return Err(EmitError::UnsafeValue {
                column,
                value: value.to_string(),
            });
        }
        Ok(())
    }

    fn date(&self, date: &NaiveDateTime) -> EmitResult<String> {
        let mut out = String::new();
        write!(out, "{}", date.format(&self.date_format))
            .map_err(|_| EmitError::DateFormat(self.date_format.clone()))?;
        Ok(out)
    }
}

/// Write superseded set keys, one per record.
pub fn write_key_list<W: Write>(mut out: W, keys: &[u64], record: char) -> io::Result<()> {
    for key in keys {
        write!(out, "{}{}", key, record)?;
    }
    out.flush()
}
