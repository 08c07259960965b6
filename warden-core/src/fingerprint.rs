//! Request fingerprints for cache keying
//!
//! A fingerprint is a SHA-256 digest over a length-prefixed canonical
//! encoding of the request's query shape. Two requests with semantically
//! identical parameters yield identical fingerprints: filters iterate in
//! field order, projections and identifier sets are sorted before hashing,
//! JSON object values are re-rendered with sorted keys. Sort keys keep
//! their order since it is semantically significant.

use crate::document::RecordId;
use crate::filter::{FieldCondition, Filter, FindOptions, SortOrder};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Deterministic, order-independent cache key for one read query shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestFingerprint([u8; 32]);

const DOMAIN_TAG: &[u8] = b"warden.fingerprint.v1";

impl RequestFingerprint {
    /// Compute the fingerprint of a query shape.
    pub fn compute(
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
        ids: &[RecordId],
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(DOMAIN_TAG);
        write_segment(&mut hasher, collection.as_bytes());

        for (field, condition) in filter.iter() {
            write_segment(&mut hasher, field.as_bytes());
            match condition {
                FieldCondition::Eq(v) => {
                    hasher.update([0x01]);
                    write_segment(&mut hasher, canonical_json(v).as_bytes());
                }
                FieldCondition::In(vs) => {
                    hasher.update([0x02]);
                    let mut rendered: Vec<String> = vs.iter().map(canonical_json).collect();
                    rendered.sort();
                    hasher.update((rendered.len() as u32).to_le_bytes());
                    for item in rendered {
                        write_segment(&mut hasher, item.as_bytes());
                    }
                }
                FieldCondition::Ne(v) => {
                    hasher.update([0x03]);
                    write_segment(&mut hasher, canonical_json(v).as_bytes());
                }
            }
        }

        let mut projection = options.projection.clone();
        projection.sort();
        hasher.update([0x10]);
        hasher.update((projection.len() as u32).to_le_bytes());
        for field in &projection {
            write_segment(&mut hasher, field.as_bytes());
        }

        hasher.update([0x11]);
        hasher.update((options.sort.len() as u32).to_le_bytes());
        for (field, order) in &options.sort {
            write_segment(&mut hasher, field.as_bytes());
            hasher.update([match order {
                SortOrder::Asc => 0,
                SortOrder::Desc => 1,
            }]);
        }

        hasher.update([0x12]);
        hasher.update(options.skip.to_le_bytes());
        match options.limit {
            Some(limit) => {
                hasher.update([1]);
                hasher.update(limit.to_le_bytes());
            }
            None => hasher.update([0; 9]),
        }

        let mut sorted_ids: Vec<[u8; 16]> = ids.iter().map(|id| *id.as_bytes()).collect();
        sorted_ids.sort();
        hasher.update([0x13]);
        hasher.update((sorted_ids.len() as u32).to_le_bytes());
        for id in &sorted_ids {
            hasher.update(id);
        }

        let digest = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    /// Lowercase hex rendering used as the cache key within a collection's
    /// namespace.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

fn write_segment(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u32).to_le_bytes());
    hasher.update(bytes);
}

/// Render a JSON value with object keys sorted recursively.
fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let inner = keys
                .iter()
                .map(|k| format!("{}:{}", serde_json::to_string(k).unwrap_or_default(), canonical_json(&map[*k])))
                .collect::<Vec<_>>()
                .join(",");
            format!("{{{}}}", inner)
        }
        Value::Array(items) => {
            let inner = items
                .iter()
                .map(canonical_json)
                .collect::<Vec<_>>()
                .join(",");
            format!("[{}]", inner)
        }
        other => other.to_string(),
    }
}
