//! Identifier-field schema
//!
//! Which document fields are identifier-typed is declared explicitly per
//! collection at configuration time, instead of inspecting key names at
//! runtime. Declared fields are canonicalized to hyphenated-lowercase UUID
//! strings when a request is built; malformed values are a params error.

use crate::document::{fields, Document};
use crate::error::ParamsError;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Per-collection declaration of identifier-typed fields.
///
/// `_id` is identifier-typed for every collection and need not be declared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdSchema {
    declared: BTreeMap<String, BTreeSet<String>>,
}

impl IdSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare identifier-typed fields for a collection.
    pub fn declare<I, S>(mut self, collection: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self.declared.entry(collection.into()).or_default();
        for field in fields {
            entry.insert(field.into());
        }
        self
    }

    /// Whether a field of a collection is identifier-typed.
    pub fn is_id_field(&self, collection: &str, field: &str) -> bool {
        if field == fields::ID {
            return true;
        }
        self.declared
            .get(collection)
            .map(|set| set.contains(field))
            .unwrap_or(false)
    }

    /// Canonicalize every declared identifier field in a document.
    ///
    /// String values parse as UUIDs and re-render hyphenated-lowercase;
    /// null and absent fields pass through; anything else is rejected.
    pub fn normalize(&self, collection: &str, doc: &mut Document) -> Result<(), ParamsError> {
        let field_names: Vec<String> = doc.keys().cloned().collect();
        for field in field_names {
            if !self.is_id_field(collection, &field) {
                continue;
            }
            let Some(value) = doc.get_mut(&field) else {
                continue;
            };
            match value {
                serde_json::Value::String(s) if s.is_empty() => {}
                serde_json::Value::String(s) => {
                    let parsed = Uuid::parse_str(s).map_err(|_| {
                        ParamsError::single(
                            field.clone(),
                            format!("invalid identifier value: {}", s),
                        )
                    })?;
                    *s = parsed.to_string();
                }
                serde_json::Value::Null => {}
                other => {
                    return Err(ParamsError::single(
                        field.clone(),
                        format!("identifier field must be a string, got {}", other),
                    ));
                }
            }
        }
        Ok(())
    }
}
