//! Permission evaluator
//!
//! Determines whether an actor may perform a task on a collection and/or a
//! specific record set. Four independent sources can authorize a task:
//! record-level grants, collection-level grants, full ownership of every
//! requested record, and the global administrator flag. An inactive account
//! is always denied, admin or not. Unknown tasks fail closed at the
//! `TaskKind` parse boundary.
//!
//! Record-level grant checks test the capability flag matching the task
//! (`can_delete` for delete, `can_read` for read), not `can_update`.

use crate::context::RequestContext;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::debug;
use warden_core::{
    fields, AccessDecision, AccessProfile, AuthError, Capability, Document, FieldCondition,
    Filter, FindOptions, RecordId, RoleGrant, TaskKind, WardenResult,
};

/// Resolve the actor's identity, account status, group and active grants
/// for the given record set.
///
/// Fails with `TokenExpired` when the stored access credential has lapsed
/// (or carries no parsable expiry), `Unauthorized` when no matching access
/// record or no user account exists. The account's active flag is carried
/// on the profile; `evaluate` enforces it.
pub fn check_task_access(
    ctx: &RequestContext,
    record_ids: &[RecordId],
) -> WardenResult<AccessProfile> {
    let actor = ctx.actor.as_ref().ok_or_else(|| AuthError::Unauthorized {
        reason: "please ensure that you are logged-in".to_string(),
    })?;
    if !actor.has_credentials() {
        return Err(AuthError::Unauthorized {
            reason: "please ensure that you are logged-in".to_string(),
        }
        .into());
    }

    // Access credential: {user, token, login-name} must match a stored key.
    let access_filter = Filter::eq("user_id", json!(actor.user_id.to_string()))
        .and_eq("token", json!(actor.token.clone()))
        .and_eq("login_name", json!(actor.login_name.clone()));
    let access_key = ctx
        .access_store
        .find_one(&ctx.options.access_collection, &access_filter)?
        .ok_or_else(|| AuthError::Unauthorized {
            reason: "please ensure that you are logged-in".to_string(),
        })?;
    if credential_expired(&access_key) {
        return Err(AuthError::TokenExpired.into());
    }

    // Account: must exist; activity is carried on the profile and
    // enforced by the evaluator.
    let user = ctx
        .access_store
        .find_one(&ctx.options.user_collection, &Filter::by_ids(&[actor.user_id]))?
        .ok_or_else(|| AuthError::Unauthorized {
            reason: "user information not found".to_string(),
        })?;
    let group = string_field(&user, "group");
    let groups = string_array_field(&user, "groups");
    let is_active = user
        .get(fields::IS_ACTIVE)
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let is_admin = user
        .get("is_admin")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    // Resolve the collection's service id; "collection"-category services
    // contribute it to the grant-lookup keys alongside the record ids.
    let service = ctx.access_store.find_one(
        &ctx.options.service_collection,
        &Filter::eq("name", json!(ctx.collection.clone())),
    )?;
    let collection_id = service.as_ref().and_then(|svc| {
        let category = string_field(svc, "category");
        if category.eq_ignore_ascii_case("collection") {
            svc.get(fields::ID).and_then(Value::as_str).map(String::from)
        } else {
            None
        }
    });

    let mut service_ids: Vec<Value> = record_ids
        .iter()
        .map(|id| json!(id.to_string()))
        .collect();
    if let Some(id) = &collection_id {
        service_ids.push(json!(id.clone()));
    }

    let grants = if service_ids.is_empty() {
        vec![]
    } else {
        load_role_grants(ctx, &group, service_ids)?
    };

    Ok(AccessProfile {
        user_id: actor.user_id,
        group,
        groups,
        is_active,
        is_admin,
        grants,
        collection_id,
    })
}

/// Load the active role grants for a group over a set of scope handles.
fn load_role_grants(
    ctx: &RequestContext,
    group: &str,
    service_ids: Vec<Value>,
) -> WardenResult<Vec<RoleGrant>> {
    let filter = Filter::eq("group", json!(group))
        .and("service_id", FieldCondition::In(service_ids))
        .and_eq(fields::IS_ACTIVE, json!(true));
    let docs = ctx.access_store.find(
        &ctx.options.role_collection,
        &filter,
        &FindOptions::default(),
    )?;
    Ok(docs
        .into_iter()
        .filter_map(|doc| serde_json::from_value::<RoleGrant>(Value::Object(doc)).ok())
        .collect())
}

/// Evaluate whether the actor may perform `task` on the context's
/// collection and the given record set.
///
/// Overall permission is the logical OR across record-level grants,
/// collection-level grants, full ownership and the administrator flag.
/// A grant set of size zero at a given level is "not applicable", never
/// automatic failure.
pub fn evaluate(
    ctx: &RequestContext,
    task: TaskKind,
    record_ids: &[RecordId],
) -> WardenResult<AccessDecision> {
    let profile = check_task_access(ctx, record_ids)?;

    // Inactive accounts always deny, before any other source is weighed.
    if !profile.is_active {
        return Err(AuthError::Unauthorized {
            reason: "account is not active".to_string(),
        }
        .into());
    }

    // Ownership: every requested record must be created by the actor;
    // partial ownership grants nothing on this path.
    let mut owner_permitted = false;
    if !record_ids.is_empty() {
        let owned_filter = Filter::by_ids(record_ids)
            .and_eq(fields::CREATED_BY, json!(profile.user_id.to_string()));
        let owned = ctx.app_store.count(&ctx.collection, &owned_filter)?;
        owner_permitted = owned as usize == record_ids.len();
    }

    // Partition grants into collection-level and record-level scopes.
    let id_strings: Vec<String> = record_ids.iter().map(|id| id.to_string()).collect();
    let collection_grants: Vec<&RoleGrant> = profile
        .grants
        .iter()
        .filter(|g| Some(&g.service_category) == profile.collection_id.as_ref())
        .collect();
    let record_grants: Vec<&RoleGrant> = profile
        .grants
        .iter()
        .filter(|g| id_strings.contains(&g.service_category))
        .collect();

    let capability = task.capability();
    let mut collection_permitted = false;
    let mut record_permitted = false;
    if !profile.is_admin {
        if !collection_grants.is_empty() {
            collection_permitted = collection_grants.iter().all(|g| g.allows(capability));
        }
        // Record-level checks apply to tasks addressing existing records.
        if capability != Capability::Create && !id_strings.is_empty() {
            record_permitted = id_strings.iter().all(|id| {
                record_grants
                    .iter()
                    .any(|g| &g.service_id == id && g.allows(capability))
            });
        }
    }

    let permitted =
        record_permitted || collection_permitted || owner_permitted || profile.is_admin;
    if !permitted {
        debug!(
            collection = %ctx.collection,
            task = %task,
            user = %profile.user_id,
            "task denied: no grant source authorized the request"
        );
        return Err(AuthError::Unauthorized {
            reason: "you are not authorized to perform the requested action/task".to_string(),
        }
        .into());
    }

    Ok(AccessDecision {
        permitted: true,
        is_admin: profile.is_admin,
        is_active: profile.is_active,
        user_id: profile.user_id,
        group: profile.group,
        groups: profile.groups,
        collection_id: profile.collection_id,
    })
}

/// Evaluate permission for a filter-addressed task by re-deriving the
/// record set from the loaded pre-mutation snapshot.
pub fn evaluate_by_current_records(
    ctx: &RequestContext,
    task: TaskKind,
    current: &[Document],
) -> WardenResult<AccessDecision> {
    let ids: Vec<RecordId> = current.iter().filter_map(warden_core::doc_id).collect();
    evaluate(ctx, task, &ids)
}

fn credential_expired(access_key: &Document) -> bool {
    let expiry = access_key
        .get("expires_at")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));
    match expiry {
        Some(expires_at) => Utc::now() > expires_at,
        // no parsable expiry: fail closed
        None => true,
    }
}

fn string_field(doc: &Document, field: &str) -> String {
    doc.get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn string_array_field(doc: &Document, field: &str) -> Vec<String> {
    doc.get(field)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}
