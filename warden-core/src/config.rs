//! Guard configuration and relation model

use crate::error::{ConfigInvalid, WardenError, WardenResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-process guard configuration: explicit named fields with documented
/// defaults, constructed once and never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardOptions {
    /// Leading matches to skip on reads. Default 0.
    pub skip: u64,
    /// Maximum documents returned per read. Default 10_000.
    pub limit: u64,
    /// Hard ceiling `limit` is clamped to. Default 10_000.
    pub max_query_limit: u64,
    /// Declared parent collections of the target collection.
    pub parent_collections: Vec<String>,
    /// Declared child collections probed by the delete integrity check.
    pub child_collections: Vec<String>,
    /// Reserved: cascade deletes to children. Default false.
    pub recursive_delete: bool,
    /// Run the permission evaluator on each task. Default false.
    pub check_access: bool,
    /// Collection receiving audit events. Default "audits".
    pub audit_collection: String,
    /// Collection registering resource categories. Default "services".
    pub service_collection: String,
    /// Collection holding user accounts. Default "users".
    pub user_collection: String,
    /// Collection holding role grants. Default "roles".
    pub role_collection: String,
    /// Collection holding access credentials. Default "access_keys".
    pub access_collection: String,
    /// Read-cache entry lifetime. Default 300 seconds.
    pub cache_expiry: Duration,
    /// Audit-log toggles per task type. All default false.
    pub log_create: bool,
    pub log_update: bool,
    pub log_read: bool,
    pub log_delete: bool,
    /// Stamp `created_at`/`updated_at` on writes when absent. Default true.
    pub stamp_time: bool,
    /// Stamp `created_by`/`updated_by` on writes when absent. Default true.
    pub stamp_actor: bool,
    /// Stamp `is_active: true` on writes when absent. Default true.
    pub stamp_active: bool,
}

impl Default for GuardOptions {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: 10_000,
            max_query_limit: 10_000,
            parent_collections: vec![],
            child_collections: vec![],
            recursive_delete: false,
            check_access: false,
            audit_collection: "audits".to_string(),
            service_collection: "services".to_string(),
            user_collection: "users".to_string(),
            role_collection: "roles".to_string(),
            access_collection: "access_keys".to_string(),
            cache_expiry: Duration::from_secs(300),
            log_create: false,
            log_update: false,
            log_read: false,
            log_delete: false,
            stamp_time: true,
            stamp_actor: true,
            stamp_active: true,
        }
    }
}

impl GuardOptions {
    /// Validate the configuration.
    pub fn validate(&self) -> WardenResult<()> {
        if self.max_query_limit == 0 {
            return Err(WardenError::Config(ConfigInvalid {
                field: "max_query_limit".to_string(),
                value: "0".to_string(),
                reason: "max_query_limit must be greater than 0".to_string(),
            }));
        }
        if self.limit > self.max_query_limit {
            return Err(WardenError::Config(ConfigInvalid {
                field: "limit".to_string(),
                value: self.limit.to_string(),
                reason: format!("limit must not exceed max_query_limit ({})", self.max_query_limit),
            }));
        }
        for (field, value) in [
            ("audit_collection", &self.audit_collection),
            ("service_collection", &self.service_collection),
            ("user_collection", &self.user_collection),
            ("role_collection", &self.role_collection),
            ("access_collection", &self.access_collection),
        ] {
            if value.is_empty() {
                return Err(WardenError::Config(ConfigInvalid {
                    field: field.to_string(),
                    value: String::new(),
                    reason: "collection name must not be empty".to_string(),
                }));
            }
        }
        Ok(())
    }
}

/// A declared parent/child relationship between two collections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    /// Parent side of the relationship.
    pub source_collection: String,
    /// Child side of the relationship.
    pub target_collection: String,
}

/// Static relation declarations for one collection, used for the duration
/// of a delete evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationModel {
    pub collection: String,
    pub relations: Vec<Relation>,
}

impl RelationModel {
    pub fn new(collection: impl Into<String>, relations: Vec<Relation>) -> Self {
        Self {
            collection: collection.into(),
            relations,
        }
    }

    /// Collections this collection's records point up to.
    pub fn parent_collections(&self) -> Vec<String> {
        self.relations
            .iter()
            .filter(|r| r.target_collection == self.collection)
            .map(|r| r.source_collection.clone())
            .collect()
    }

    /// Collections whose records may point at this collection's records.
    pub fn child_collections(&self) -> Vec<String> {
        self.relations
            .iter()
            .filter(|r| r.source_collection == self.collection)
            .map(|r| r.target_collection.clone())
            .collect()
    }
}
