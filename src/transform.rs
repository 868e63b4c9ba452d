//! Field transformation engine.
//!
//! Applies a [`TransformRules`] set to a record in a fixed order:
//! remove, then change (rename), then conditional add. An added field can
//! therefore never be removed by the same pass, and `unless` conditions see
//! renamed fields under their new tags.

use crate::record::Record;
use crate::rules::{AddFieldRule, ChangeFieldRule, FieldRule, TransformRules};

/// Apply `rules` to `record` in place.
pub fn process(record: &mut Record, rules: &TransformRules) {
    remove_fields(record, &rules.remove_fields);
    change_fields(record, &rules.change_fields);
    add_fields(record, &rules.add_fields);
}

/// Apply `rules` to an owned record and hand it back.
#[must_use]
pub fn process_owned(mut record: Record, rules: &TransformRules) -> Record {
    process(&mut record, rules);
    record
}

/// Apply a single step. Returns how many fields it touched.
pub fn apply(record: &mut Record, rule: &FieldRule) -> usize {
    match rule {
        FieldRule::Remove(tags) => remove_fields(record, tags),
        FieldRule::Change(change) => change_fields(record, std::slice::from_ref(change)),
        FieldRule::Add(add) => add_fields(record, std::slice::from_ref(add)),
    }
}

/// Delete every field whose tag is in `tags`. Returns how many were removed.
pub fn remove_fields(record: &mut Record, tags: &[String]) -> usize {
    if tags.is_empty() {
        return 0;
    }
    record.remove_fields(tags).len()
}

/// Apply renames in list order; each rule sees the result of the previous one.
pub fn change_fields(record: &mut Record, rules: &[ChangeFieldRule]) -> usize {
    rules
        .iter()
        .map(|rule| record.change_tag(&rule.from, &rule.to))
        .sum()
}

/// Append fields whose `unless` condition finds no match. Returns how many
/// were added.
pub fn add_fields(record: &mut Record, rules: &[AddFieldRule]) -> usize {
    let mut added = 0;
    for rule in rules {
        let blocked = rule
            .unless
            .as_ref()
            .is_some_and(|matcher| record.fields().any(|field| matcher.matches(field)));
        if !blocked {
            record.add_field(rule.build_field());
            added += 1;
        }
    }
    added
}
