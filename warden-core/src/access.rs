//! Actor identity, role grants and access decisions

use crate::document::{RecordId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Per-request actor identity, constructed once from inbound credentials
/// and immutable for the request's duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorContext {
    pub user_id: RecordId,
    pub token: String,
    pub login_name: String,
    /// Credential expiry claimed by the caller; the evaluator still checks
    /// the stored access record's own expiry.
    pub expires_at: Timestamp,
    pub first_name: String,
    pub last_name: String,
    pub language: String,
}

impl ActorContext {
    /// A context with an absent token is never treated as valid.
    pub fn has_credentials(&self) -> bool {
        !self.token.is_empty() && !self.login_name.is_empty()
    }
}

/// The task a request asks the guard layer to authorize.
///
/// `Insert` and `Remove` are wire-surface aliases of `Create` and `Delete`.
/// Anything else fails closed at the parse boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    Create,
    Insert,
    Update,
    Delete,
    Remove,
    Read,
}

impl TaskKind {
    /// The capability flag a grant must carry for this task.
    pub fn capability(self) -> Capability {
        match self {
            TaskKind::Create | TaskKind::Insert => Capability::Create,
            TaskKind::Update => Capability::Update,
            TaskKind::Delete | TaskKind::Remove => Capability::Delete,
            TaskKind::Read => Capability::Read,
        }
    }
}

impl FromStr for TaskKind {
    type Err = UnknownTask;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(TaskKind::Create),
            "insert" => Ok(TaskKind::Insert),
            "update" => Ok(TaskKind::Update),
            "delete" => Ok(TaskKind::Delete),
            "remove" => Ok(TaskKind::Remove),
            "read" => Ok(TaskKind::Read),
            other => Err(UnknownTask {
                task: other.to_string(),
            }),
        }
    }
}

/// Unrecognized task type: fail-closed, not fail-open.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown access type or access type not specified: {task}")]
pub struct UnknownTask {
    pub task: String,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskKind::Create => "create",
            TaskKind::Insert => "insert",
            TaskKind::Update => "update",
            TaskKind::Delete => "delete",
            TaskKind::Remove => "remove",
            TaskKind::Read => "read",
        };
        f.write_str(name)
    }
}

/// One of the four grantable capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    Create,
    Update,
    Delete,
    Read,
}

/// A single authorization assertion loaded from the access store.
/// Never mutated; only filtered/queried in memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleGrant {
    /// Scope handle: a collection's service id, or a record id for
    /// record-level grants.
    #[serde(default)]
    pub service_id: String,
    #[serde(default)]
    pub role_id: String,
    /// Grant scope discriminator matched against the resolved collection id
    /// or the requested record ids.
    #[serde(default)]
    pub service_category: String,
    #[serde(default)]
    pub can_read: bool,
    #[serde(default)]
    pub can_create: bool,
    #[serde(default)]
    pub can_update: bool,
    #[serde(default)]
    pub can_delete: bool,
    #[serde(default)]
    pub is_active: bool,
}

impl RoleGrant {
    /// Pure capability predicate: one function for all four flags.
    pub fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::Create => self.can_create,
            Capability::Update => self.can_update,
            Capability::Delete => self.can_delete,
            Capability::Read => self.can_read,
        }
    }
}

/// Resolved identity attributes and grants, produced by the credential and
/// account checks, consumed by the capability table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessProfile {
    pub user_id: RecordId,
    pub group: String,
    pub groups: Vec<String>,
    pub is_active: bool,
    pub is_admin: bool,
    pub grants: Vec<RoleGrant>,
    /// Service id of the target collection, when registered as a
    /// "collection"-category service.
    pub collection_id: Option<String>,
}

/// The resolved outcome of evaluating grants against a task. Produced once
/// per permission check, consumed immediately, not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessDecision {
    pub permitted: bool,
    pub is_admin: bool,
    pub is_active: bool,
    pub user_id: RecordId,
    pub group: String,
    pub groups: Vec<String>,
    pub collection_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant(create: bool, update: bool, delete: bool, read: bool) -> RoleGrant {
        RoleGrant {
            service_id: "svc".to_string(),
            role_id: "role".to_string(),
            service_category: "cat".to_string(),
            can_create: create,
            can_update: update,
            can_delete: delete,
            can_read: read,
            is_active: true,
        }
    }

    #[test]
    fn test_task_kind_parse_and_aliases() {
        assert_eq!("create".parse::<TaskKind>().unwrap(), TaskKind::Create);
        assert_eq!("remove".parse::<TaskKind>().unwrap(), TaskKind::Remove);
        assert_eq!(
            TaskKind::Insert.capability(),
            TaskKind::Create.capability()
        );
        assert_eq!(
            TaskKind::Remove.capability(),
            TaskKind::Delete.capability()
        );
    }

    #[test]
    fn test_unknown_task_fails_closed() {
        let err = "truncate".parse::<TaskKind>().unwrap_err();
        assert!(err.to_string().contains("truncate"));
    }

    #[test]
    fn test_allows_checks_matching_flag_only() {
        let update_only = grant(false, true, false, false);
        assert!(update_only.allows(Capability::Update));
        // delete and read must check their own flags, not can_update
        assert!(!update_only.allows(Capability::Delete));
        assert!(!update_only.allows(Capability::Read));
        assert!(!update_only.allows(Capability::Create));

        let delete_only = grant(false, false, true, false);
        assert!(delete_only.allows(Capability::Delete));
        assert!(!delete_only.allows(Capability::Update));
    }

    #[test]
    fn test_grant_deserialize_defaults_flags_false() {
        let grant: RoleGrant = serde_json::from_value(serde_json::json!({
            "service_id": "s1",
            "role_id": "r1",
            "service_category": "c1"
        }))
        .unwrap();
        assert!(!grant.can_create);
        assert!(!grant.can_update);
        assert!(!grant.can_delete);
        assert!(!grant.can_read);
        assert!(!grant.is_active);
    }

    #[test]
    fn test_actor_credentials_presence() {
        let actor = ActorContext {
            user_id: crate::document::new_record_id(),
            token: String::new(),
            login_name: "abc".to_string(),
            expires_at: chrono::Utc::now(),
            first_name: String::new(),
            last_name: String::new(),
            language: "en-US".to_string(),
        };
        assert!(!actor.has_credentials());
    }
}
