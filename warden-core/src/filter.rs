//! Query filters and find options
//!
//! The guard layer issues a deliberately small filter language: field
//! equality, set membership (for `_id`/`parent_id` probes) and inequality
//! (for update-time uniqueness predicates). Filters iterate in a
//! deterministic field order, which the request fingerprint relies on.

use crate::document::{fields, id_value, Document, RecordId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A single field constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldCondition {
    /// Field equals the value.
    Eq(Value),
    /// Field is one of the values.
    In(Vec<Value>),
    /// Field differs from the value (absent fields also pass).
    Ne(Value),
}

impl FieldCondition {
    fn matches(&self, actual: Option<&Value>) -> bool {
        match self {
            FieldCondition::Eq(expected) => actual == Some(expected),
            FieldCondition::In(set) => actual.map(|v| set.contains(v)).unwrap_or(false),
            FieldCondition::Ne(excluded) => actual != Some(excluded),
        }
    }
}

/// An attribute filter over one collection, ordered by field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    conditions: BTreeMap<String, FieldCondition>,
}

impl Filter {
    /// Empty filter: matches every document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-field equality filter.
    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Self::new().and_eq(field, value)
    }

    /// Filter matching documents whose `_id` is in the given set.
    pub fn by_ids(ids: &[RecordId]) -> Self {
        Self::field_in(fields::ID, ids)
    }

    /// Filter matching documents whose named field is in the given id set.
    pub fn field_in(field: impl Into<String>, ids: &[RecordId]) -> Self {
        let values = ids.iter().map(|id| id_value(*id)).collect();
        Self::new().and(field, FieldCondition::In(values))
    }

    /// Add a condition, consuming and returning the filter.
    pub fn and(mut self, field: impl Into<String>, condition: FieldCondition) -> Self {
        self.conditions.insert(field.into(), condition);
        self
    }

    /// Add an equality condition.
    pub fn and_eq(self, field: impl Into<String>, value: Value) -> Self {
        self.and(field, FieldCondition::Eq(value))
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    /// Iterate conditions in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldCondition)> {
        self.conditions.iter()
    }

    /// Copy of this filter with the `_id` condition removed, if present.
    /// Mutation-by-filter paths strip caller-supplied `_id` constraints.
    pub fn without_id(&self) -> Self {
        let mut conditions = self.conditions.clone();
        conditions.remove(fields::ID);
        Self { conditions }
    }

    /// Whether a document satisfies every condition.
    pub fn matches(&self, doc: &Document) -> bool {
        self.conditions
            .iter()
            .all(|(field, cond)| cond.matches(doc.get(field)))
    }

    /// Render the filter's attribute pairs for conflict messages,
    /// e.g. `code: OY2b | parent_id: P1`.
    pub fn describe_attributes(&self) -> String {
        self.conditions
            .iter()
            .map(|(field, cond)| match cond {
                FieldCondition::Eq(v) => format!("{}: {}", field, render_value(v)),
                FieldCondition::In(vs) => {
                    let joined = vs.iter().map(render_value).collect::<Vec<_>>().join(", ");
                    format!("{}: in [{}]", field, joined)
                }
                FieldCondition::Ne(v) => format!("{}: not {}", field, render_value(v)),
            })
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Sort direction for one sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Projection, sort and paging options for read queries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindOptions {
    /// Number of leading matches to skip.
    pub skip: u64,
    /// Maximum number of documents to return; `None` means unbounded.
    pub limit: Option<u64>,
    /// Fields to include; empty means all fields. `_id` is always kept.
    pub projection: Vec<String>,
    /// Sort keys applied in order.
    pub sort: Vec<(String, SortOrder)>,
}

impl FindOptions {
    /// Apply projection to a document, always retaining `_id`.
    pub fn project(&self, doc: &Document) -> Document {
        if self.projection.is_empty() {
            return doc.clone();
        }
        let mut out = Document::new();
        if let Some(id) = doc.get(fields::ID) {
            out.insert(fields::ID.to_string(), id.clone());
        }
        for field in &self.projection {
            if let Some(value) = doc.get(field) {
                out.insert(field.clone(), value.clone());
            }
        }
        out
    }

    /// Total ordering between documents under this option's sort keys.
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        for (field, order) in &self.sort {
            let ord = compare_values(a.get(field), b.get(field));
            let ord = match order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

/// Compare two optional JSON values with a stable cross-type order:
/// absent < null < bool < number < string < array/object (by rendering).
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None => 0,
            Some(Value::Null) => 1,
            Some(Value::Bool(_)) => 2,
            Some(Value::Number(_)) => 3,
            Some(Value::String(_)) => 4,
            Some(Value::Array(_)) | Some(Value::Object(_)) => 5,
        }
    }
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a)
            .cmp(&rank(b))
            .then_with(|| format!("{:?}", a).cmp(&format!("{:?}", b))),
    }
}
