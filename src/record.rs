//! MARC bibliographic record structures and operations.
//!
//! This module provides the core record types:
//! - [`Record`] - A leader plus an ordered list of fields
//! - [`Field`] - A control field (001-009) or a data field (010+)
//! - [`Subfield`] - Coded data elements within a data field
//!
//! Fields keep the position they were read or added in. There is no
//! per-tag grouping, so removing or renaming fields never reorders the rest
//! of the record.
//!
//! # Examples
//!
//! ```
//! use libsys_marc::{Field, Leader, Record};
//!
//! let record = Record::builder(Leader::default())
//!     .control_field_str("001", "a123456789")
//!     .field(
//!         Field::builder("245", '0', '1')
//!             .subfield_str('a', "The pragmatic programmer :")
//!             .build(),
//!     )
//!     .build();
//!
//! assert_eq!(record.get_control_field("001"), Some("a123456789"));
//! assert_eq!(record.fields_by_tag("245").count(), 1);
//! ```

use crate::leader::Leader;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// A MARC bibliographic record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Record leader (24 bytes)
    pub leader: Leader,
    /// Control and data fields in record order
    pub fields: Vec<Field>,
}

/// A field in a MARC record
///
/// Control fields (tags `001`-`009`) hold their value in [`Field::data`] and
/// have blank indicators and no subfields. Data fields have `data == None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Field tag (3 characters)
    pub tag: String,
    /// First indicator
    pub indicator1: char,
    /// Second indicator
    pub indicator2: char,
    /// Subfields (stored in `SmallVec` to avoid allocation for typical fields with 4 or fewer subfields)
    pub subfields: SmallVec<[Subfield; 4]>,
    /// Value of a control field
    pub data: Option<String>,
}

/// A subfield within a field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subfield {
    /// Subfield code (single character)
    pub code: char,
    /// Subfield value
    pub value: String,
}

/// Returns true for control field tags (`001`-`009`, and `000`).
#[must_use]
pub fn is_control_tag(tag: &str) -> bool {
    tag.len() == 3 && tag.starts_with("00") && tag.bytes().all(|b| b.is_ascii_digit())
}

/// Returns true if `tag` is a well-formed field tag: exactly three ASCII
/// alphanumerics.
#[must_use]
pub fn is_valid_tag(tag: &str) -> bool {
    tag.len() == 3 && tag.bytes().all(|b| b.is_ascii_alphanumeric())
}

impl Record {
    /// Create a new MARC record with the given leader
    #[must_use]
    pub fn new(leader: Leader) -> Self {
        Record {
            leader,
            fields: Vec::new(),
        }
    }

    /// Create a builder for fluently constructing MARC records
    #[must_use]
    pub fn builder(leader: Leader) -> RecordBuilder {
        RecordBuilder {
            record: Record::new(leader),
        }
    }

    /// Append a control field
    pub fn add_control_field(&mut self, tag: String, value: String) {
        self.fields.push(Field::control(tag, value));
    }

    /// Append a control field using string slices
    pub fn add_control_field_str(&mut self, tag: &str, value: &str) {
        self.add_control_field(tag.to_string(), value.to_string());
    }

    /// Get the first control field value for a tag
    #[must_use]
    pub fn get_control_field(&self, tag: &str) -> Option<&str> {
        self.fields
            .iter()
            .filter(|f| f.tag == tag)
            .find_map(|f| f.data.as_deref())
    }

    /// Append a field
    pub fn add_field(&mut self, field: Field) {
        self.fields.push(field);
    }

    /// Get first field with a given tag
    #[must_use]
    pub fn get_field(&self, tag: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.tag == tag)
    }

    /// Iterate over all fields in record order
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    /// Iterate mutably over all fields in record order
    pub fn fields_mut(&mut self) -> impl Iterator<Item = &mut Field> {
        self.fields.iter_mut()
    }

    /// Iterate over fields matching a specific tag
    ///
    /// # Examples
    ///
    /// ```ignore
    /// for field in record.fields_by_tag("650") {
    ///     if let Some(subject) = field.get_subfield('a') {
    ///         println!("Subject: {}", subject);
    ///     }
    /// }
    /// ```
    pub fn fields_by_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Field> + 'a {
        self.fields.iter().filter(move |f| f.tag == tag)
    }

    /// Iterate mutably over fields matching a specific tag
    pub fn fields_by_tag_mut<'a>(
        &'a mut self,
        tag: &'a str,
    ) -> impl Iterator<Item = &'a mut Field> + 'a {
        self.fields.iter_mut().filter(move |f| f.tag == tag)
    }

    /// Returns true if any field carries `tag`.
    #[must_use]
    pub fn has_field(&self, tag: &str) -> bool {
        self.fields.iter().any(|f| f.tag == tag)
    }

    /// Number of fields in the record
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the record has no fields
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Remove every field whose tag is in `tags`, returning the removed
    /// fields in their original order.
    pub fn remove_fields<S: AsRef<str>>(&mut self, tags: &[S]) -> Vec<Field> {
        self.remove_fields_where(|f| tags.iter().any(|t| t.as_ref() == f.tag))
    }

    /// Remove fields matching a predicate, preserving the order of the rest.
    pub fn remove_fields_where<F>(&mut self, mut predicate: F) -> Vec<Field>
    where
        F: FnMut(&Field) -> bool,
    {
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.fields.len());
        for field in self.fields.drain(..) {
            if predicate(&field) {
                removed.push(field);
            } else {
                kept.push(field);
            }
        }
        self.fields = kept;
        removed
    }

    /// Retag every field tagged `from` as `to`; returns how many changed.
    ///
    /// See [`Field::retag`] for how control and data fields convert.
    pub fn change_tag(&mut self, from: &str, to: &str) -> usize {
        let mut changed = 0;
        for field in self.fields_by_tag_mut(from) {
            field.retag(to);
            changed += 1;
        }
        changed
    }
}

/// Builder for fluently constructing MARC records
#[derive(Debug)]
pub struct RecordBuilder {
    record: Record,
}

impl RecordBuilder {
    /// Add a control field
    #[must_use]
    pub fn control_field(mut self, tag: String, value: String) -> Self {
        self.record.add_control_field(tag, value);
        self
    }

    /// Add a control field using string slices
    #[must_use]
    pub fn control_field_str(mut self, tag: &str, value: &str) -> Self {
        self.record.add_control_field_str(tag, value);
        self
    }

    /// Add a field
    #[must_use]
    pub fn field(mut self, field: Field) -> Self {
        self.record.add_field(field);
        self
    }

    /// Build the record
    #[must_use]
    pub fn build(self) -> Record {
        self.record
    }
}

impl Field {
    /// Create a new data field
    #[must_use]
    pub fn new(tag: impl Into<String>, indicator1: char, indicator2: char) -> Self {
        Field {
            tag: tag.into(),
            indicator1,
            indicator2,
            subfields: SmallVec::new(),
            data: None,
        }
    }

    /// Create a control field
    #[must_use]
    pub fn control(tag: impl Into<String>, value: impl Into<String>) -> Self {
        Field {
            tag: tag.into(),
            indicator1: ' ',
            indicator2: ' ',
            subfields: SmallVec::new(),
            data: Some(value.into()),
        }
    }

    /// Create a builder for a data field
    #[must_use]
    pub fn builder(tag: impl Into<String>, indicator1: char, indicator2: char) -> FieldBuilder {
        FieldBuilder {
            field: Field::new(tag, indicator1, indicator2),
        }
    }

    /// Returns true for control fields
    #[must_use]
    pub fn is_control(&self) -> bool {
        self.data.is_some()
    }

    /// Add a subfield
    pub fn add_subfield(&mut self, code: char, value: String) {
        self.subfields.push(Subfield { code, value });
    }

    /// Add a subfield using a string slice
    pub fn add_subfield_str(&mut self, code: char, value: &str) {
        self.add_subfield(code, value.to_string());
    }

    /// Get the first value of a subfield
    #[must_use]
    pub fn get_subfield(&self, code: char) -> Option<&str> {
        self.subfields_by_code(code).next()
    }

    /// Iterate over all values for a subfield code
    pub fn subfields_by_code(&self, code: char) -> impl Iterator<Item = &str> {
        self.subfields
            .iter()
            .filter(move |sf| sf.code == code)
            .map(|sf| sf.value.as_str())
    }

    /// Field content as text: the control value, or subfield values joined by spaces.
    #[must_use]
    pub fn value(&self) -> String {
        match &self.data {
            Some(data) => data.clone(),
            None => self
                .subfields
                .iter()
                .map(|sf| sf.value.as_str())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    /// Change this field's tag.
    ///
    /// Moving a control field to a data tag turns its value into subfield
    /// `a` with blank indicators (`001 gls_123` becomes `035 $a gls_123`).
    /// Moving a data field to a control tag makes [`Field::value`] its
    /// control value. Otherwise only the tag changes.
    pub fn retag(&mut self, to: &str) {
        let to_control = is_control_tag(to);
        match self.data.take() {
            Some(data) if !to_control => {
                self.indicator1 = ' ';
                self.indicator2 = ' ';
                self.subfields.clear();
                self.subfields.push(Subfield {
                    code: 'a',
                    value: data,
                });
            },
            Some(data) => self.data = Some(data),
            None if to_control => {
                self.data = Some(self.value());
                self.indicator1 = ' ';
                self.indicator2 = ' ';
                self.subfields.clear();
            },
            None => {},
        }
        self.tag = to.to_string();
    }
}

/// Builder for fluently constructing data fields
#[derive(Debug)]
pub struct FieldBuilder {
    field: Field,
}

impl FieldBuilder {
    /// Add a subfield
    #[must_use]
    pub fn subfield(mut self, code: char, value: String) -> Self {
        self.field.add_subfield(code, value);
        self
    }

    /// Add a subfield using a string slice
    #[must_use]
    pub fn subfield_str(mut self, code: char, value: &str) -> Self {
        self.field.add_subfield_str(code, value);
        self
    }

    /// Build the field
    #[must_use]
    pub fn build(self) -> Field {
        self.field
    }
}
