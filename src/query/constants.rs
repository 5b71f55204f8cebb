//! Hoisted constants and the labels they are bound under.

use serde::Serialize;

use crate::query::Value;
use crate::types::{QueryError, Result};

/// How a serializer pass names the constants it hoists.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LabelScheme {
    /// `a`, `b`, … `z`, `a1`, `b1`, …
    Alphabetic,
    /// `<prefix>1`, `<prefix>2`, …
    Prefixed(String),
}

impl LabelScheme {
    /// Label for the constant hoisted at position `idx` of a pass.
    pub fn label(&self, idx: usize) -> String {
        match self {
            LabelScheme::Alphabetic => alphabetic_label(idx),
            LabelScheme::Prefixed(prefix) => format!("{prefix}{}", idx + 1),
        }
    }
}

fn alphabetic_label(idx: usize) -> String {
    const FIRST: u8 = b'a';
    let letter = (FIRST + (idx % 26) as u8) as char;
    if idx < 26 {
        letter.to_string()
    } else {
        format!("{}{}", letter, idx / 26)
    }
}

/// One hoisted constant.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Parameter {
    /// Placeholder emitted into the query text.
    pub label: String,
    /// Value bound to the placeholder at execution time.
    pub value: Value,
}

/// Insertion-ordered mapping between hoisted constants and their labels.
///
/// Within one serializer pass equal values share a label. Maps from separate
/// passes are merged by label, so the same literal used by two clauses is
/// declared once per clause.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ConstantMap {
    entries: Vec<Parameter>,
    #[serde(skip)]
    next_index: usize,
}

impl ConstantMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the label for `value`, assigning the next label of `scheme`
    /// when the value has not been seen in this map.
    pub fn label_for(&mut self, value: &Value, scheme: &LabelScheme) -> &str {
        self.label_excluding(value, scheme, &[])
    }

    /// Like [`ConstantMap::label_for`], but never assigns a label listed in
    /// `reserved`. Used to keep labels apart from declared variable names.
    pub fn label_excluding(
        &mut self,
        value: &Value,
        scheme: &LabelScheme,
        reserved: &[String],
    ) -> &str {
        let idx = match self.entries.iter().position(|p| &p.value == value) {
            Some(idx) => idx,
            None => {
                let label = loop {
                    let candidate = scheme.label(self.next_index);
                    self.next_index += 1;
                    if !reserved.contains(&candidate) {
                        break candidate;
                    }
                };
                self.entries.push(Parameter {
                    label,
                    value: value.clone(),
                });
                self.entries.len() - 1
            }
        };
        &self.entries[idx].label
    }

    /// Appends every entry of `other`, preserving its order.
    pub fn merge(&mut self, other: ConstantMap) -> Result<()> {
        for param in other.entries {
            if self.entries.iter().any(|p| p.label == param.label) {
                return Err(QueryError::DuplicateLabel(param.label));
            }
            self.entries.push(param);
        }
        Ok(())
    }

    /// Value bound under `label`.
    pub fn get(&self, label: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|p| p.label == label)
            .map(|p| &p.value)
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.entries.iter()
    }

    /// Number of hoisted constants.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing was hoisted.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Declared-parameters text, `"<Type> <label>[, ...]"`.
    pub fn declaration(&self) -> Option<String> {
        if self.entries.is_empty() {
            return None;
        }
        let parts: Vec<String> = self
            .entries
            .iter()
            .map(|p| format!("{} {}", p.value.type_name(), p.label))
            .collect();
        Some(parts.join(", "))
    }

    /// Bound values, positionally aligned with [`ConstantMap::declaration`].
    pub fn values(&self) -> Vec<Value> {
        self.entries.iter().map(|p| p.value.clone()).collect()
    }
}

impl IntoIterator for ConstantMap {
    type Item = Parameter;
    type IntoIter = std::vec::IntoIter<Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
