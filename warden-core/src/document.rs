//! Document and identifier primitives

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

/// Record identifier using UUIDv7 for timestamp-sortable IDs.
pub type RecordId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// A schemaless store document: a JSON object keyed by field name.
/// Identifier-typed fields hold canonical hyphenated-lowercase UUID strings.
pub type Document = serde_json::Map<String, Value>;

/// Well-known document field names.
pub mod fields {
    /// Store-assigned record identifier.
    pub const ID: &str = "_id";
    /// Self-referential parent link within a collection.
    pub const PARENT_ID: &str = "parent_id";
    /// Actor that created the record.
    pub const CREATED_BY: &str = "created_by";
    /// Creation timestamp.
    pub const CREATED_AT: &str = "created_at";
    /// Actor that last updated the record.
    pub const UPDATED_BY: &str = "updated_by";
    /// Last update timestamp.
    pub const UPDATED_AT: &str = "updated_at";
    /// Soft-active flag stamped on writes.
    pub const IS_ACTIVE: &str = "is_active";
}

/// Generate a new record identifier (timestamp-sortable).
pub fn new_record_id() -> RecordId {
    Uuid::now_v7()
}

/// Render a record id as its canonical JSON value form.
pub fn id_value(id: RecordId) -> Value {
    Value::String(id.to_string())
}

/// Extract and parse the `_id` field of a document, if present and valid.
pub fn doc_id(doc: &Document) -> Option<RecordId> {
    doc.get(fields::ID)
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
}

/// Whether a document carries a concrete `_id` value.
///
/// An absent key, JSON null, or empty string all count as "no identifier":
/// save requests may carry `_id: ""` placeholders that must route to the
/// create path.
pub fn has_concrete_id(doc: &Document) -> bool {
    match doc.get(fields::ID) {
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Null) | None => false,
        Some(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc_with_id(id: Value) -> Document {
        let mut doc = Document::new();
        doc.insert(fields::ID.to_string(), id);
        doc
    }

    #[test]
    fn test_new_record_ids_are_unique_and_sortable() {
        let a = new_record_id();
        let b = new_record_id();
        assert_ne!(a, b);
        // UUIDv7 embeds a timestamp, so later ids compare greater or equal
        assert!(b >= a);
    }

    #[test]
    fn test_doc_id_roundtrip() {
        let id = new_record_id();
        let doc = doc_with_id(id_value(id));
        assert_eq!(doc_id(&doc), Some(id));
    }

    #[test]
    fn test_doc_id_rejects_malformed() {
        let doc = doc_with_id(json!("not-a-uuid"));
        assert_eq!(doc_id(&doc), None);
    }

    #[test]
    fn test_has_concrete_id() {
        assert!(has_concrete_id(&doc_with_id(id_value(new_record_id()))));
        assert!(!has_concrete_id(&doc_with_id(json!(""))));
        assert!(!has_concrete_id(&doc_with_id(Value::Null)));
        assert!(!has_concrete_id(&Document::new()));
    }
}
