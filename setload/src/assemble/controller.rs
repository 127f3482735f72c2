//! The per-line state machine that turns input lines into records.

use std::collections::HashMap;
use std::io::Write;

use chrono::NaiveDateTime;
use serde::Serialize;

use super::dedup::{SetDeduplicator, SetResolution};
use super::keys::KeyAllocator;
use crate::contract::{ExistingSetPolicy, InputContract, MalformedLinePolicy, RowLayout};
use crate::diagnostics::ErrorSink;
use crate::emit::RecordEmitter;
use crate::error::{LookupKind, PipelineError, PipelineResult};
use crate::lookup::{Resolver, StoreCatalog};
use crate::models::{Key, SetMemberRecord, SetRecord};
use crate::parser::RawLine;

/// Why a line produced no records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Wrong field count, under a skip policy.
    Structural,
    /// A lookup failed.
    Unresolved(LookupKind),
}

/// What became of one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    Accepted {
        /// Present when this line introduced the set.
        header: Option<SetRecord>,
        member: SetMemberRecord,
    },
    Rejected {
        line: usize,
        reason: Rejection,
    },
}

/// Counters for one assembled run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssemblyReport {
    pub lines_read: usize,
    pub accepted: usize,
    pub rejected_structural: usize,
    pub rejected_unresolved: usize,
    pub sets_created: usize,
    pub sets_reused: usize,
    /// Existing sets whose stored members are replaced by this run.
    pub superseded: Vec<Key>,
    /// First and one-past-last set key allocated.
    pub set_keys: (Key, Key),
    /// First and one-past-last set-member key allocated.
    pub member_keys: (Key, Key),
}

/// Assembles Set and SetMember records from input lines.
///
/// Owns the key allocator, the deduplicator and the sequence counters for
/// one run; lines must be fed in input order.
pub struct SetAssembler<'a, S: ?Sized> {
    store: &'a S,
    contract: InputContract,
    layout: RowLayout,
    keys: KeyAllocator,
    sets: SetDeduplicator,
    member_sequence: HashMap<Key, u32>,
    set_sequence: HashMap<Key, u32>,
    stamp: NaiveDateTime,
    report: AssemblyReport,
}

impl<'a, S> SetAssembler<'a, S>
where
    S: Resolver + StoreCatalog + ?Sized,
{
    /// Start a run. Keys are seeded from `store`; `stamp` is used for every
    /// creation and modification date.
    pub fn new(store: &'a S, contract: InputContract, layout: RowLayout, stamp: NaiveDateTime) -> Self {
        Self {
            store,
            contract,
            layout,
            keys: KeyAllocator::seeded(store),
            sets: SetDeduplicator::new(),
            member_sequence: HashMap::new(),
            set_sequence: HashMap::new(),
            stamp,
            report: AssemblyReport::default(),
        }
    }

    /// Process one line.
    ///
    /// Recoverable problems come back as [`LineOutcome::Rejected`] after
    /// being recorded in `errors`. A malformed line under an abort policy is
    /// returned as [`PipelineError::Malformed`].
    pub fn process_line(&mut self, raw: RawLine, errors: &mut ErrorSink) -> PipelineResult<LineOutcome> {
        self.report.lines_read += 1;
        let line = raw.line;

        let raw = match raw.expect_width(self.layout.width(), self.contract.delimiter) {
            Ok(raw) => raw,
            Err(err) => match self.contract.on_malformed {
                MalformedLinePolicy::Abort => return Err(PipelineError::Malformed(err)),
                MalformedLinePolicy::Skip => {
                    errors.record(err);
                    return Ok(self.reject(line, Rejection::Structural));
                }
            },
        };
        let row = self.layout.row(&raw.fields);

        // Lookups stop at the first miss so a bad line logs exactly one error.
        let Some(created_by) = self.store.resolve_user(row.created_by, line, errors) else {
            return Ok(self.reject(line, Rejection::Unresolved(LookupKind::User)));
        };
        let Some(type_key) = self.store.resolve_type(row.set_type, line, errors) else {
            return Ok(self.reject(line, Rejection::Unresolved(LookupKind::Type)));
        };
        let Some(object_key) = self.store.resolve_object(row.member, type_key, line, errors) else {
            return Ok(self.reject(line, Rejection::Unresolved(LookupKind::Object)));
        };

        let identity = self.contract.identity.identity(type_key, row.set_name);
        let stored = match self.contract.existing_sets {
            ExistingSetPolicy::Reuse => self.store.existing_set(type_key, row.set_name),
            ExistingSetPolicy::Create => None,
        };

        let resolution = self.sets.resolve_or_reuse(identity, &mut self.keys, stored);
        let set_key = resolution.key();
        let header = match resolution {
            SetResolution::Created(_) => {
                let store = self.store;
                let sequence = self
                    .set_sequence
                    .entry(type_key)
                    .or_insert_with(|| store.max_set_sequence(type_key));
                *sequence += 1;
                self.report.sets_created += 1;
                Some(SetRecord::new(
                    set_key,
                    type_key,
                    row.set_name,
                    *sequence,
                    created_by,
                    self.stamp,
                ))
            }
            SetResolution::Reused(_) => {
                self.report.sets_reused += 1;
                self.report.superseded.push(set_key);
                None
            }
            SetResolution::Known(_) => None,
        };

        let sequence = self.member_sequence.entry(set_key).or_insert(0);
        *sequence += 1;
        let member = SetMemberRecord::new(
            self.keys.next_member_key(),
            set_key,
            object_key,
            row.label.map(str::to_string),
            *sequence,
            created_by,
            self.stamp,
        );

        self.report.accepted += 1;
        Ok(LineOutcome::Accepted { header, member })
    }

    /// Process every line, handing records to `emitter` as they are made.
    pub fn run<W1: Write, W2: Write>(
        &mut self,
        lines: impl IntoIterator<Item = RawLine>,
        emitter: &mut RecordEmitter<W1, W2>,
        errors: &mut ErrorSink,
    ) -> PipelineResult<()> {
        for raw in lines {
            if let LineOutcome::Accepted { header, member } = self.process_line(raw, errors)? {
                if let Some(set) = &header {
                    emitter.emit_set(set)?;
                }
                emitter.emit_member(&member)?;
            }
        }
        Ok(())
    }

    /// Counters so far, including the key ranges used.
    pub fn report(&self) -> AssemblyReport {
        let set_keys = self.keys.set_keys();
        let member_keys = self.keys.member_keys();
        AssemblyReport {
            set_keys: (set_keys.start, set_keys.end),
            member_keys: (member_keys.start, member_keys.end),
            ..self.report.clone()
        }
    }

    fn reject(&mut self, line: usize, reason: Rejection) -> LineOutcome {
        match reason {
            Rejection::Structural => self.report.rejected_structural += 1,
            Rejection::Unresolved(_) => self.report.rejected_unresolved += 1,
        }
        LineOutcome::Rejected { line, reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::SetDefaults;
    use crate::emit::{Delimiters, DEFAULT_DATE_FORMAT};
    use crate::error::LineError;
    use crate::lookup::SnapshotStore;
    use crate::parser::split_lines;
    use chrono::NaiveDate;

    const STORE: &str = r#"{
        "max_set_key": 41,
        "max_set_member_key": 1200,
        "users": { "user1": 1001, "user2": 1002 },
        "types": { "Source": 5, "Marker": 2 },
        "objects": {
            "Source": { "geneA": 101, "geneB": 102, "geneC": 103, "libX": 104 },
            "Marker": { "Pax6": 201, "Kit": 202 }
        },
        "sets": [
            { "key": 7, "type": "Source", "name": "Old", "sequence": 3 },
            { "key": 30, "type": "Marker", "name": "Favorites", "sequence": 1 }
        ]
    }"#;

    fn store() -> SnapshotStore {
        SnapshotStore::from_json(STORE).unwrap()
    }

    fn stamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn assembler<'a>(store: &'a SnapshotStore, contract: InputContract) -> SetAssembler<'a, SnapshotStore> {
        assembler_with(store, contract, &SetDefaults::default())
    }

    fn assembler_with<'a>(
        store: &'a SnapshotStore,
        contract: InputContract,
        defaults: &SetDefaults,
    ) -> SetAssembler<'a, SnapshotStore> {
        let layout = contract.layout(defaults).unwrap();
        SetAssembler::new(store, contract, layout, stamp())
    }

    struct Output {
        sets: Vec<Vec<String>>,
        members: Vec<Vec<String>>,
        errors: Vec<LineError>,
        report: AssemblyReport,
    }

    fn rows(bytes: Vec<u8>) -> Vec<Vec<String>> {
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|l| l.split('\t').map(str::to_string).collect())
            .collect()
    }

    fn run(assembler: &mut SetAssembler<'_, SnapshotStore>, input: &str) -> PipelineResult<Output> {
        let mut emitter =
            RecordEmitter::new(Vec::new(), Vec::new(), Delimiters::default(), DEFAULT_DATE_FORMAT)?;
        let mut errors = ErrorSink::in_memory();
        let lines = split_lines(input, '\t')?;
        assembler.run(lines, &mut emitter, &mut errors)?;
        let (sets, members) = emitter.finish()?;
        Ok(Output {
            sets: rows(sets),
            members: rows(members),
            errors: errors.finish()?,
            report: assembler.report(),
        })
    }

    #[test]
    fn test_two_members_one_set() {
        let store = store();
        let mut assembler = assembler(&store, InputContract::member_first());
        let out = run(
            &mut assembler,
            "geneA\tLabelX\tCloneSet\tSource\tuser1\ngeneB\tLabelY\tCloneSet\tSource\tuser1\n",
        )
        .unwrap();

        assert_eq!(out.sets.len(), 1);
        assert_eq!(out.sets[0][0], "42");
        assert_eq!(out.sets[0][2], "CloneSet");
        // Source already has a set with sequence 3
        assert_eq!(out.sets[0][3], "4");

        assert_eq!(out.members.len(), 2);
        assert_eq!(out.members[0][..5], ["1201", "42", "101", "LabelX", "1"]);
        assert_eq!(out.members[1][..5], ["1202", "42", "102", "LabelY", "2"]);
        assert!(out.errors.is_empty());
    }

    #[test]
    fn test_member_sequence_is_per_set() {
        let store = store();
        let mut assembler = assembler(&store, InputContract::set_first());
        let input = "S1\tSource\tgeneA\tuser1\n\
                     S2\tSource\tgeneB\tuser1\n\
                     S1\tSource\tgeneC\tuser1\n\
                     S2\tSource\tlibX\tuser2\n\
                     S1\tSource\tlibX\tuser1\n";
        let out = run(&mut assembler, input).unwrap();

        assert_eq!(out.sets.len(), 2);
        let by_set = |set_key: &str| -> Vec<String> {
            out.members
                .iter()
                .filter(|m| m[1] == set_key)
                .map(|m| m[4].clone())
                .collect()
        };
        assert_eq!(by_set("42"), ["1", "2", "3"]);
        assert_eq!(by_set("43"), ["1", "2"]);

        // Set sequence continues per type
        assert_eq!(out.sets[0][3], "4");
        assert_eq!(out.sets[1][3], "5");
    }

    #[test]
    fn test_member_keys_contiguous_from_seed() {
        let store = store();
        let mut assembler = assembler(&store, InputContract::member_first());
        let input = "geneA\t\tS\tSource\tuser1\n\
                     nope\t\tS\tSource\tuser1\n\
                     geneB\t\tT\tSource\tuser1\n\
                     geneC\t\tS\tSource\tnobody\n\
                     geneC\t\tS\tSource\tuser1\n";
        let out = run(&mut assembler, input).unwrap();

        let keys: Vec<u64> = out.members.iter().map(|m| m[0].parse().unwrap()).collect();
        assert_eq!(keys, [1201, 1202, 1203]);
        assert_eq!(out.report.member_keys, (1201, 1204));
        assert_eq!(out.report.accepted, 3);
        assert_eq!(out.report.rejected_unresolved, 2);
    }

    #[test]
    fn test_unresolved_line_has_no_side_effects() {
        let store = store();
        let mut assembler = assembler(&store, InputContract::member_first());
        // The first line would introduce NewSet but its member is unknown
        let input = "ghost\tL\tNewSet\tSource\tuser1\ngeneA\tL\tOther\tSource\tuser1\n";
        let out = run(&mut assembler, input).unwrap();

        assert_eq!(out.sets.len(), 1);
        assert_eq!(out.sets[0][2], "Other");
        assert_eq!(out.sets[0][0], "42");
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].to_string(), "Invalid Object (1): ghost");
    }

    #[test]
    fn test_error_lines_count_blank_lines() {
        let store = store();
        let mut assembler = assembler(&store, InputContract::set_first());
        let input = "S\tSource\tgeneA\tuser1\n\n\nS\tSource\tghost\tuser1\n\nS\tSource\n";
        let out = run(&mut assembler, input).unwrap();

        assert_eq!(out.members.len(), 1);
        assert_eq!(out.errors.len(), 2);
        assert_eq!(out.errors[0].to_string(), "Invalid Object (4): ghost");
        assert_eq!(out.errors[1].line(), 6);
    }

    #[test]
    fn test_one_error_per_bad_line() {
        let store = store();
        let mut assembler = assembler(&store, InputContract::member_first());
        let mut errors = ErrorSink::in_memory();
        let lines = split_lines("ghost\tL\tS\tNoType\tnobody\n", '\t').unwrap();

        let outcome = assembler.process_line(lines[0].clone(), &mut errors).unwrap();

        assert_eq!(
            outcome,
            LineOutcome::Rejected {
                line: 1,
                reason: Rejection::Unresolved(LookupKind::User)
            }
        );
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_short_line_aborts_variant_a() {
        let store = store();
        let mut assembler = assembler(&store, InputContract::member_first());
        let input = "geneA\tL\tS\tSource\tuser1\ngeneB\tL\tS\n";
        let err = run(&mut assembler, input).err().unwrap();

        match err {
            PipelineError::Malformed(LineError::Structural {
                line,
                expected,
                found,
                ..
            }) => {
                assert_eq!((line, expected, found), (2, 5, 3));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_short_line_skipped_variant_b() {
        let store = store();
        let mut assembler = assembler(&store, InputContract::set_first());
        let input = "S\tSource\n\
                     S\tSource\tgeneA\tuser1\n";
        let out = run(&mut assembler, input).unwrap();

        assert_eq!(out.members.len(), 1);
        assert_eq!(out.members[0][4], "1");
        assert_eq!(out.report.rejected_structural, 1);
        assert!(out.errors[0].to_string().starts_with("Invalid Line (1)"));
    }

    #[test]
    fn test_name_identity_ignores_type() {
        let store = store();
        let mut assembler = assembler(&store, InputContract::member_first());
        let input = "geneA\t\tShared\tSource\tuser1\nPax6\t\tShared\tMarker\tuser1\n";
        let out = run(&mut assembler, input).unwrap();

        assert_eq!(out.sets.len(), 1);
        assert_eq!(out.members[1][1], "42");
        assert_eq!(out.members[1][4], "2");
    }

    #[test]
    fn test_typed_identity_splits_types() {
        let store = store();
        let mut assembler = assembler(&store, InputContract::set_first());
        let input = "Shared\tSource\tgeneA\tuser1\nShared\tMarker\tPax6\tuser1\n";
        let out = run(&mut assembler, input).unwrap();

        assert_eq!(out.sets.len(), 2);
        // Marker has a stored set with sequence 1
        assert_eq!(out.sets[1][3], "2");
    }

    #[test]
    fn test_single_set_reuses_stored_set() {
        let store = store();
        let defaults = SetDefaults {
            set_name: Some("Favorites".into()),
            set_type: Some("Marker".into()),
            created_by: Some("user2".into()),
        };
        let mut assembler = assembler_with(&store, InputContract::single_set(), &defaults);
        let out = run(&mut assembler, "Pax6\tfirst\nKit\t\n").unwrap();

        assert!(out.sets.is_empty());
        assert_eq!(out.members.len(), 2);
        assert_eq!(out.members[0][..5], ["1201", "30", "201", "first", "1"]);
        assert_eq!(out.members[1][..5], ["1202", "30", "202", "", "2"]);
        assert_eq!(out.members[0][5], "1002");

        assert_eq!(out.report.superseded, vec![30]);
        assert_eq!(out.report.sets_reused, 1);
        assert_eq!(out.report.set_keys, (42, 42));
    }

    #[test]
    fn test_single_set_creates_when_absent() {
        let store = store();
        let defaults = SetDefaults {
            set_name: Some("Fresh".into()),
            set_type: Some("Marker".into()),
            created_by: Some("user1".into()),
        };
        let mut assembler = assembler_with(&store, InputContract::single_set(), &defaults);
        let out = run(&mut assembler, "Pax6\t\nKit\t\n").unwrap();

        assert_eq!(out.sets.len(), 1);
        assert_eq!(out.sets[0][2], "Fresh");
        assert!(out.report.superseded.is_empty());
    }

    #[test]
    fn test_header_precedes_its_first_member() {
        let store = store();
        let mut assembler = assembler(&store, InputContract::set_first());
        let mut errors = ErrorSink::in_memory();
        let lines = split_lines("S\tSource\tgeneA\tuser1\nS\tSource\tgeneB\tuser1\n", '\t').unwrap();

        let first = assembler.process_line(lines[0].clone(), &mut errors).unwrap();
        let second = assembler.process_line(lines[1].clone(), &mut errors).unwrap();

        match (first, second) {
            (
                LineOutcome::Accepted { header: Some(set), member: m1 },
                LineOutcome::Accepted { header: None, member: m2 },
            ) => {
                assert_eq!(m1.set_key, set.set_key);
                assert_eq!(m2.set_key, set.set_key);
                assert_eq!(set.created_by_key, set.modified_by_key);
            }
            other => panic!("unexpected outcomes: {other:?}"),
        }
    }

    #[test]
    fn test_empty_store_starts_at_one() {
        let store = SnapshotStore::from_json(
            r#"{ "users": {"u": 1}, "types": {"T": 1}, "objects": {"T": {"m": 9}} }"#,
        )
        .unwrap();
        let mut assembler = assembler(&store, InputContract::set_first());
        let out = run(&mut assembler, "S\tT\tm\tu\n").unwrap();

        assert_eq!(out.sets[0][0], "1");
        assert_eq!(out.sets[0][3], "1");
        assert_eq!(out.members[0][0], "1");
    }
}
