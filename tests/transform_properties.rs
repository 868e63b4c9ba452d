//! Property-based tests for the field transform engine and batching.
//!
//! Records are generated from a small tag alphabet so that removes,
//! renames and `unless` conditions hit existing fields often.

mod common;

use common::{create_test_leader, read_ids};
use libsys_marc::transform::{add_fields, change_fields, remove_fields};
use libsys_marc::{
    batch_file, transform, write_records_atomic, AddFieldRule, ChangeFieldRule, Field,
    FieldMatcher, MarcReader, Record, TransformRules,
};
use proptest::prelude::*;
use std::io::Cursor;

/// Generate data field tags from a small pool
fn arb_tag() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("035".to_string()),
        Just("245".to_string()),
        Just("500".to_string()),
        Just("590".to_string()),
        Just("905".to_string()),
        Just("986".to_string()),
    ]
}

fn arb_field() -> impl Strategy<Value = Field> {
    (
        arb_tag(),
        prop::sample::select(vec![' ', '0', '1']),
        prop::sample::select(vec![' ', '0', '4']),
        prop::collection::vec((prop::sample::select(vec!['a', 'b', 'z']), "[A-Za-z0-9 ]{1,12}"), 1..4),
    )
        .prop_map(|(tag, ind1, ind2, subfields)| {
            let mut field = Field::new(tag, ind1, ind2);
            for (code, value) in subfields {
                field.add_subfield(code, value);
            }
            field
        })
}

fn arb_record() -> impl Strategy<Value = Record> {
    ("[a-z0-9]{1,10}", prop::collection::vec(arb_field(), 0..12)).prop_map(|(id, fields)| {
        let mut record = Record::new(create_test_leader());
        record.add_control_field_str("001", &id);
        for field in fields {
            record.add_field(field);
        }
        record
    })
}

fn tags(record: &Record) -> Vec<String> {
    record.fields().map(|f| f.tag.clone()).collect()
}

proptest! {
    #[test]
    fn remove_leaves_no_removed_tags_and_keeps_order(
        record in arb_record(),
        remove in prop::collection::vec(arb_tag(), 0..3),
    ) {
        let mut after = record.clone();
        remove_fields(&mut after, &remove);

        prop_assert!(after.fields().all(|f| !remove.contains(&f.tag)));
        let expected: Vec<&Field> = record.fields().filter(|f| !remove.contains(&f.tag)).collect();
        let actual: Vec<&Field> = after.fields().collect();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn rename_moves_every_field(record in arb_record(), from in arb_tag(), to in arb_tag()) {
        let before_from = record.fields_by_tag(&from).count();
        let before_to = record.fields_by_tag(&to).count();

        let mut after = record.clone();
        let changed = change_fields(&mut after, &[ChangeFieldRule::new(from.clone(), to.clone())]);

        prop_assert_eq!(changed, before_from);
        if from == to {
            prop_assert_eq!(after.fields_by_tag(&to).count(), before_to);
        } else {
            prop_assert_eq!(after.fields_by_tag(&from).count(), 0);
            prop_assert_eq!(after.fields_by_tag(&to).count(), before_to + before_from);
        }
        prop_assert_eq!(after.len(), record.len());
    }

    #[test]
    fn absent_tags_are_no_ops(record in arb_record()) {
        let mut after = record.clone();
        prop_assert_eq!(remove_fields(&mut after, &["999".to_string()]), 0);
        prop_assert_eq!(change_fields(&mut after, &[ChangeFieldRule::new("998", "035")]), 0);
        prop_assert_eq!(after, record);
    }

    #[test]
    fn add_without_unless_always_appends(record in arb_record(), tag in arb_tag()) {
        let mut after = record.clone();
        let rule = AddFieldRule::new(tag.clone()).subfield('a', "added");
        prop_assert_eq!(add_fields(&mut after, &[rule]), 1);
        prop_assert_eq!(after.len(), record.len() + 1);
        prop_assert_eq!(&after.fields().last().unwrap().tag, &tag);
    }

    #[test]
    fn add_respects_unless(record in arb_record(), tag in arb_tag()) {
        let rule = AddFieldRule::new("590")
            .subfield('a', "brief")
            .unless(FieldMatcher::tag(tag.clone()));
        let mut after = record.clone();
        let added = add_fields(&mut after, &[rule]);
        prop_assert_eq!(added == 0, record.has_field(&tag));
    }

    #[test]
    fn add_with_absent_unless_tag_always_appends(record in arb_record()) {
        let rule = AddFieldRule::new("590")
            .subfield('a', "brief")
            .unless(FieldMatcher::tag("999").subfield('a', "x"));
        let mut after = record.clone();
        prop_assert_eq!(add_fields(&mut after, &[rule]), 1);
    }

    #[test]
    fn remove_and_rename_are_idempotent(record in arb_record(), from in arb_tag(), to in arb_tag()) {
        let rules = TransformRules {
            remove_fields: vec!["905".to_string(), "986".to_string()],
            change_fields: vec![ChangeFieldRule::new(from, to)],
            ..TransformRules::default()
        };
        let once = transform::process_owned(record, &rules);
        let twice = transform::process_owned(once.clone(), &rules);
        prop_assert_eq!(tags(&once), tags(&twice));
    }

    #[test]
    fn write_read_preserves_fields(record in arb_record()) {
        let mut buffer = Vec::new();
        {
            let mut writer = libsys_marc::MarcWriter::new(&mut buffer);
            writer.write_record(&record).unwrap();
            writer.finish().unwrap();
        }
        let read = MarcReader::new(Cursor::new(buffer)).read_record().unwrap().unwrap();
        prop_assert_eq!(read.fields, record.fields);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn batching_produces_ceiling_files(count in 0usize..25, max in 1usize..8) {
        let dir = tempfile::tempdir().unwrap();
        let records: Vec<Record> = (0..count)
            .map(|i| {
                let mut record = Record::new(create_test_leader());
                record.add_control_field_str("001", &format!("r{i}"));
                record
            })
            .collect();
        write_records_atomic(&dir.path().join("in.mrc"), &records).unwrap();

        let names = batch_file(dir.path(), "in.mrc", max).unwrap();
        prop_assert_eq!(names.len(), count.div_ceil(max));

        let mut seen = Vec::new();
        for (i, name) in names.iter().enumerate() {
            let ids = read_ids(&dir.path().join(name));
            if i + 1 < names.len() {
                prop_assert_eq!(ids.len(), max);
            } else {
                prop_assert_eq!(ids.len(), count - max * (names.len() - 1));
            }
            seen.extend(ids);
        }
        let expected: Vec<String> = (0..count).map(|i| format!("r{i}")).collect();
        prop_assert_eq!(seen, expected);
    }
}
