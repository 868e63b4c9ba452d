//! Declarative field transformation rules.
//!
//! Rules arrive as JSON (vendor interface processing options) and are
//! validated when they are loaded, before any record is touched:
//!
//! ```json
//! {
//!   "remove_fields": ["905", "920"],
//!   "change_fields": [{"from": "001", "to": "035"}],
//!   "add_fields": [{
//!     "tag": "590",
//!     "subfields": [{"code": "a", "value": "MARCit brief record"}],
//!     "unless": {"tag": "035", "subfields": [{"code": "a", "value": "OCoLC"}]}
//!   }]
//! }
//! ```
//!
//! `delete_marc` and `change_marc` are accepted as aliases for
//! `remove_fields` and `change_fields`.

use crate::error::{MarcError, Result};
use crate::record::{is_control_tag, is_valid_tag, Field, Subfield};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A subfield code/value pair used to build or match a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubfieldSpec {
    /// Subfield code
    pub code: char,
    /// Subfield value
    pub value: String,
}

/// Partial description of a field, used by [`AddFieldRule::unless`].
///
/// A field matches when the tag is equal, each indicator given here is
/// equal, and every listed subfield code is present on the field with a
/// value containing the listed value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMatcher {
    /// Tag to match
    pub tag: String,
    /// First indicator, or `None` for any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indicator1: Option<char>,
    /// Second indicator, or `None` for any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indicator2: Option<char>,
    /// Required subfields (AND logic)
    #[serde(default)]
    pub subfields: Vec<SubfieldSpec>,
}

impl FieldMatcher {
    /// Match any field with this tag.
    #[must_use]
    pub fn tag(tag: impl Into<String>) -> Self {
        FieldMatcher {
            tag: tag.into(),
            indicator1: None,
            indicator2: None,
            subfields: Vec::new(),
        }
    }

    /// Require a first indicator.
    #[must_use]
    pub fn indicator1(mut self, indicator: char) -> Self {
        self.indicator1 = Some(indicator);
        self
    }

    /// Require a second indicator.
    #[must_use]
    pub fn indicator2(mut self, indicator: char) -> Self {
        self.indicator2 = Some(indicator);
        self
    }

    /// Require a subfield whose value contains `value`.
    #[must_use]
    pub fn subfield(mut self, code: char, value: impl Into<String>) -> Self {
        self.subfields.push(SubfieldSpec {
            code,
            value: value.into(),
        });
        self
    }

    /// Returns true if `field` satisfies every condition.
    ///
    /// A subfield code the field does not carry is a mismatch. Control
    /// fields have no indicators or subfields, so they only match a
    /// tag-only matcher.
    #[must_use]
    pub fn matches(&self, field: &Field) -> bool {
        if field.tag != self.tag {
            return false;
        }
        if field.is_control() {
            return self.indicator1.is_none()
                && self.indicator2.is_none()
                && self.subfields.is_empty();
        }
        if self.indicator1.is_some_and(|ind| ind != field.indicator1)
            || self.indicator2.is_some_and(|ind| ind != field.indicator2)
        {
            return false;
        }
        self.subfields.iter().all(|spec| {
            field
                .subfields_by_code(spec.code)
                .any(|value| value.contains(spec.value.as_str()))
        })
    }

    fn validate(&self) -> Result<()> {
        check_tag(&self.tag, "unless")
    }
}

/// Rename every field tagged `from` to `to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeFieldRule {
    /// Source tag
    pub from: String,
    /// Destination tag
    pub to: String,
}

impl ChangeFieldRule {
    /// Create a rename rule.
    #[must_use]
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        ChangeFieldRule {
            from: from.into(),
            to: to.into(),
        }
    }

    fn validate(&self) -> Result<()> {
        check_tag(&self.from, "change_fields.from")?;
        check_tag(&self.to, "change_fields.to")
    }
}

/// Append a field unless the record already has one matching `unless`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddFieldRule {
    /// Tag of the new field
    pub tag: String,
    /// First indicator (blank when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indicator1: Option<char>,
    /// Second indicator (blank when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indicator2: Option<char>,
    /// Subfields of the new field, in order
    #[serde(default)]
    pub subfields: Vec<SubfieldSpec>,
    /// Skip the add when any existing field matches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unless: Option<FieldMatcher>,
}

impl AddFieldRule {
    /// Create an add rule with blank indicators and no condition.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        AddFieldRule {
            tag: tag.into(),
            indicator1: None,
            indicator2: None,
            subfields: Vec::new(),
            unless: None,
        }
    }

    /// Set both indicators.
    #[must_use]
    pub fn indicators(mut self, indicator1: char, indicator2: char) -> Self {
        self.indicator1 = Some(indicator1);
        self.indicator2 = Some(indicator2);
        self
    }

    /// Append a subfield to the new field.
    #[must_use]
    pub fn subfield(mut self, code: char, value: impl Into<String>) -> Self {
        self.subfields.push(SubfieldSpec {
            code,
            value: value.into(),
        });
        self
    }

    /// Only add when no existing field matches `matcher`.
    #[must_use]
    pub fn unless(mut self, matcher: FieldMatcher) -> Self {
        self.unless = Some(matcher);
        self
    }

    /// Build the field this rule appends.
    ///
    /// For a control tag the single subfield's value becomes the control value.
    #[must_use]
    pub fn build_field(&self) -> Field {
        if is_control_tag(&self.tag) {
            let value = self
                .subfields
                .first()
                .map(|sf| sf.value.clone())
                .unwrap_or_default();
            return Field::control(self.tag.clone(), value);
        }
        let mut field = Field::new(
            self.tag.clone(),
            self.indicator1.unwrap_or(' '),
            self.indicator2.unwrap_or(' '),
        );
        field.subfields.extend(self.subfields.iter().map(|sf| Subfield {
            code: sf.code,
            value: sf.value.clone(),
        }));
        field
    }

    fn validate(&self) -> Result<()> {
        check_tag(&self.tag, "add_fields.tag")?;
        if is_control_tag(&self.tag) && self.subfields.len() != 1 {
            return Err(MarcError::InvalidRule(format!(
                "add_fields: control field {} needs exactly one subfield holding its value",
                self.tag
            )));
        }
        if !is_control_tag(&self.tag) && self.subfields.is_empty() {
            return Err(MarcError::InvalidRule(format!(
                "add_fields: field {} has no subfields",
                self.tag
            )));
        }
        if let Some(matcher) = &self.unless {
            matcher.validate()?;
        }
        Ok(())
    }
}

/// One transformation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldRule {
    /// Delete every field with one of these tags.
    Remove(Vec<String>),
    /// Rename fields.
    Change(ChangeFieldRule),
    /// Conditionally append a field.
    Add(AddFieldRule),
}

/// A validated rule set, applied as remove, then change, then add.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransformRules {
    /// Tags to delete
    #[serde(alias = "delete_marc")]
    pub remove_fields: Vec<String>,
    /// Renames, applied in order
    #[serde(alias = "change_marc")]
    pub change_fields: Vec<ChangeFieldRule>,
    /// Conditional additions, applied in order
    pub add_fields: Vec<AddFieldRule>,
}

impl TransformRules {
    /// Parse and validate rules from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::Json`] for malformed JSON (including indicators or
    /// codes longer than one character) and [`MarcError::InvalidRule`] for a
    /// bad tag or field shape.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let rules: TransformRules = serde_json::from_str(json)?;
        rules.validate()?;
        Ok(rules)
    }

    /// Parse and validate rules from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the rules are invalid.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    /// Check every tag and field shape.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidRule`] describing the first problem.
    pub fn validate(&self) -> Result<()> {
        for tag in &self.remove_fields {
            check_tag(tag, "remove_fields")?;
        }
        for rule in &self.change_fields {
            rule.validate()?;
        }
        for rule in &self.add_fields {
            rule.validate()?;
        }
        Ok(())
    }

    /// Returns true when applying these rules cannot change a record.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.remove_fields.is_empty() && self.change_fields.is_empty() && self.add_fields.is_empty()
    }

    /// The rules as an ordered list of steps.
    #[must_use]
    pub fn steps(&self) -> Vec<FieldRule> {
        let mut steps = Vec::with_capacity(1 + self.change_fields.len() + self.add_fields.len());
        if !self.remove_fields.is_empty() {
            steps.push(FieldRule::Remove(self.remove_fields.clone()));
        }
        steps.extend(self.change_fields.iter().cloned().map(FieldRule::Change));
        steps.extend(self.add_fields.iter().cloned().map(FieldRule::Add));
        steps
    }
}

fn check_tag(tag: &str, context: &str) -> Result<()> {
    if is_valid_tag(tag) {
        Ok(())
    } else {
        Err(MarcError::InvalidRule(format!(
            "{context}: tag '{tag}' must be exactly 3 letters or digits"
        )))
    }
}
