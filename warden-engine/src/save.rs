//! Save orchestration
//!
//! One entry point covers create, update-by-id and admin bulk-update-by-
//! filter. The payload is partitioned by the presence of a concrete `_id`:
//! items carrying one are updates, items without one (including empty-string
//! placeholders) are creates. Exactly one path runs per request; a payload
//! mixing both is refused rather than half-applied.
//!
//! Every path runs the uniqueness check before writing. Callers must be
//! explicit about uniqueness: a request with no exist predicates is refused
//! outright, never treated as conflict-free.
//!
//! Write stamps (`created_*`, `updated_*`, `is_active`) are applied only
//! when the field is absent and the matching `stamp_*` option is on, so
//! caller-supplied values always win.

use crate::access;
use crate::context::RequestContext;
use crate::exists;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;
use warden_core::{
    doc_id, fields, AuthError, Document, Filter, MutationError, ParamsError, RecordId, TaskKind,
    WardenResult,
};

/// Which save path ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveKind {
    Created,
    Updated,
}

/// Outcome of a save request: the path taken and the affected count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOutcome {
    pub kind: SaveKind,
    pub count: u64,
}

/// Payload split into create and update sets, stamped and ready to write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SavePartition {
    pub creates: Vec<Document>,
    pub updates: Vec<Document>,
    /// Ids of the update set, parallel to `updates`.
    pub update_ids: Vec<RecordId>,
}

/// Split the request payload into create and update sets.
///
/// Items with a concrete `_id` join the update set; items without one join
/// the create set with any empty-`_id` placeholder key dropped. A concrete
/// `_id` that does not parse as an identifier is a caller defect.
pub fn partition_items(ctx: &RequestContext) -> WardenResult<SavePartition> {
    let now = json!(Utc::now().to_rfc3339());
    let mut partition = SavePartition::default();
    for item in &ctx.action_params {
        let mut item = item.clone();
        if warden_core::has_concrete_id(&item) {
            let id = doc_id(&item).ok_or_else(|| {
                ParamsError::single(fields::ID, "is not a valid record identifier")
            })?;
            stamp_updated(&mut item, ctx, &now);
            partition.updates.push(item);
            partition.update_ids.push(id);
        } else {
            item.remove(fields::ID);
            stamp_created(&mut item, ctx, &now);
            partition.creates.push(item);
        }
    }
    Ok(partition)
}

/// Save the request payload, selecting exactly one of the three paths:
/// pure create, update by id, or admin bulk update by query filter.
pub fn save_records(ctx: &RequestContext) -> WardenResult<SaveOutcome> {
    if ctx.action_params.is_empty() {
        return Err(
            ParamsError::single("action_params", "at least one document is required").into(),
        );
    }
    let partition = partition_items(ctx)?;
    // caller-supplied _id constraints never address a mutation filter
    let query = ctx.query.without_id();

    if !partition.updates.is_empty() {
        if !partition.creates.is_empty() {
            return Err(MutationError::SaveConflict {
                reason: "payload mixes new and existing records; save them separately"
                    .to_string(),
            }
            .into());
        }
        return update_by_ids(ctx, &partition);
    }
    if !query.is_empty() && partition.creates.len() == 1 {
        return update_by_filter(ctx, &query);
    }
    create_records(ctx, &partition.creates)
}

fn create_records(ctx: &RequestContext, docs: &[Document]) -> WardenResult<SaveOutcome> {
    if ctx.options.check_access {
        access::evaluate(ctx, TaskKind::Create, &[])?;
    }
    exists::check_exists(ctx)?;

    let inserted = ctx.app_store.insert_many(&ctx.collection, docs)?;
    if inserted == 0 {
        return Err(MutationError::InsertFailed {
            reason: "the store reported no inserted records".to_string(),
        }
        .into());
    }

    ctx.invalidate_cache();
    if ctx.options.log_create {
        audit_create(ctx, docs);
    }
    Ok(SaveOutcome {
        kind: SaveKind::Created,
        count: inserted,
    })
}

fn update_by_ids(ctx: &RequestContext, partition: &SavePartition) -> WardenResult<SaveOutcome> {
    if ctx.options.check_access {
        access::evaluate(ctx, TaskKind::Update, &partition.update_ids)?;
    }
    exists::check_exists(ctx)?;
    let before = exists::load_current_by_ids(ctx, &partition.update_ids)?;

    let mut modified = 0;
    for (item, id) in partition.updates.iter().zip(&partition.update_ids) {
        let mut patch = item.clone();
        patch.remove(fields::ID);
        modified += ctx
            .app_store
            .update_one(&ctx.collection, &Filter::by_ids(&[*id]), &patch)?;
    }
    if modified == 0 {
        return Err(MutationError::UpdateFailed {
            reason: "the store reported no modified records".to_string(),
        }
        .into());
    }

    ctx.invalidate_cache();
    if ctx.options.log_update {
        audit_update(ctx, &before, &partition.updates);
    }
    Ok(SaveOutcome {
        kind: SaveKind::Updated,
        count: modified,
    })
}

/// Bulk update every record matching the query filter with a single patch.
/// Restricted to administrators when access checks are on.
fn update_by_filter(ctx: &RequestContext, query: &Filter) -> WardenResult<SaveOutcome> {
    if ctx.options.check_access {
        let decision = access::evaluate(ctx, TaskKind::Update, &[])?;
        if !decision.is_admin {
            return Err(AuthError::Unauthorized {
                reason: "bulk update by filter is restricted to administrators".to_string(),
            }
            .into());
        }
    }
    exists::check_exists(ctx)?;
    let before = exists::load_current_by_filter(ctx, query)?;

    // the single payload item, re-stamped as a patch
    let mut patch = ctx.action_params[0].clone();
    patch.remove(fields::ID);
    let now = json!(Utc::now().to_rfc3339());
    stamp_updated(&mut patch, ctx, &now);

    let modified = ctx.app_store.update_many(&ctx.collection, query, &patch)?;
    if modified == 0 {
        return Err(MutationError::UpdateFailed {
            reason: "the store reported no modified records".to_string(),
        }
        .into());
    }

    ctx.invalidate_cache();
    if ctx.options.log_update {
        audit_update(ctx, &before, std::slice::from_ref(&patch));
    }
    Ok(SaveOutcome {
        kind: SaveKind::Updated,
        count: modified,
    })
}

fn stamp_created(doc: &mut Document, ctx: &RequestContext, now: &Value) {
    if ctx.options.stamp_time && !doc.contains_key(fields::CREATED_AT) {
        doc.insert(fields::CREATED_AT.to_string(), now.clone());
    }
    if ctx.options.stamp_actor && !doc.contains_key(fields::CREATED_BY) {
        if let Some(actor) = &ctx.actor {
            doc.insert(
                fields::CREATED_BY.to_string(),
                json!(actor.user_id.to_string()),
            );
        }
    }
    if ctx.options.stamp_active && !doc.contains_key(fields::IS_ACTIVE) {
        doc.insert(fields::IS_ACTIVE.to_string(), json!(true));
    }
}

fn stamp_updated(doc: &mut Document, ctx: &RequestContext, now: &Value) {
    if ctx.options.stamp_time && !doc.contains_key(fields::UPDATED_AT) {
        doc.insert(fields::UPDATED_AT.to_string(), now.clone());
    }
    if ctx.options.stamp_actor && !doc.contains_key(fields::UPDATED_BY) {
        if let Some(actor) = &ctx.actor {
            doc.insert(
                fields::UPDATED_BY.to_string(),
                json!(actor.user_id.to_string()),
            );
        }
    }
    if ctx.options.stamp_active && !doc.contains_key(fields::IS_ACTIVE) {
        doc.insert(fields::IS_ACTIVE.to_string(), json!(true));
    }
}

fn docs_value(docs: &[Document]) -> Value {
    Value::Array(docs.iter().cloned().map(Value::Object).collect())
}

// Audit writes never fail the mutation they describe.
fn audit_create(ctx: &RequestContext, docs: &[Document]) {
    let Some(actor) = ctx.actor.as_ref() else {
        return;
    };
    if let Err(err) = ctx
        .audit
        .record_create(&ctx.collection, docs_value(docs), actor.user_id)
    {
        warn!(collection = %ctx.collection, error = %err, "create audit failed");
    }
}

fn audit_update(ctx: &RequestContext, before: &[Document], after: &[Document]) {
    let Some(actor) = ctx.actor.as_ref() else {
        return;
    };
    if let Err(err) = ctx.audit.record_update(
        &ctx.collection,
        docs_value(before),
        docs_value(after),
        actor.user_id,
    ) {
        warn!(collection = %ctx.collection, error = %err, "update audit failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;
    use warden_core::{id_value, new_record_id, ActorContext, FieldCondition, GuardOptions};
    use warden_storage::{CacheBackend, DocumentStore, MemoryAuditSink, MemoryCache, MemoryStore};

    fn doc(pairs: &[(&str, Value)]) -> Document {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn actor() -> ActorContext {
        ActorContext {
            user_id: new_record_id(),
            token: "tok".to_string(),
            login_name: "abbey".to_string(),
            expires_at: Utc::now() + Duration::hours(1),
            first_name: String::new(),
            last_name: String::new(),
            language: "en-US".to_string(),
        }
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        cache: Arc<MemoryCache>,
        audit: Arc<MemoryAuditSink>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: Arc::new(MemoryStore::new()),
                cache: Arc::new(MemoryCache::new()),
                audit: Arc::new(MemoryAuditSink::new()),
            }
        }

        fn builder(&self) -> crate::context::RequestContextBuilder {
            RequestContext::builder(
                self.store.clone(),
                self.cache.clone(),
                self.audit.clone(),
                "items",
            )
            .actor(actor())
        }
    }

    #[test]
    fn test_partition_routes_empty_id_to_create_and_drops_placeholder() {
        let fx = Fixture::new();
        let id = new_record_id();
        let ctx = fx
            .builder()
            .action_params(vec![
                doc(&[("_id", json!("")), ("name", json!("new"))]),
                doc(&[("_id", id_value(id)), ("name", json!("old"))]),
            ])
            .build()
            .unwrap();

        let partition = partition_items(&ctx).unwrap();
        assert_eq!(partition.creates.len(), 1);
        assert!(!partition.creates[0].contains_key("_id"));
        assert_eq!(partition.updates.len(), 1);
        assert_eq!(partition.update_ids, vec![id]);
    }

    #[test]
    fn test_malformed_id_is_rejected_at_build_time() {
        let fx = Fixture::new();
        let err = fx
            .builder()
            .action_params(vec![doc(&[("_id", json!("not-a-uuid"))])])
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), "paramsError");
    }

    #[test]
    fn test_partition_stamps_only_absent_fields() {
        let fx = Fixture::new();
        let supplied_by = new_record_id().to_string();
        let ctx = fx
            .builder()
            .action_params(vec![
                doc(&[("name", json!("a"))]),
                doc(&[
                    ("name", json!("b")),
                    ("created_by", json!(supplied_by.clone())),
                    ("is_active", json!(false)),
                ]),
            ])
            .build()
            .unwrap();

        let partition = partition_items(&ctx).unwrap();
        let stamped = &partition.creates[0];
        assert!(stamped.contains_key("created_at"));
        assert!(stamped.contains_key("created_by"));
        assert_eq!(stamped["is_active"], json!(true));

        // caller-supplied values are never overwritten
        let supplied = &partition.creates[1];
        assert_eq!(supplied["created_by"], json!(supplied_by));
        assert_eq!(supplied["is_active"], json!(false));
    }

    #[test]
    fn test_empty_payload_is_params_error() {
        let fx = Fixture::new();
        let ctx = fx.builder().build().unwrap();
        let err = save_records(&ctx).unwrap_err();
        assert_eq!(err.kind(), "paramsError");
    }

    #[test]
    fn test_mixed_create_and_update_batch_is_save_conflict() {
        let fx = Fixture::new();
        let id = new_record_id();
        fx.store
            .insert_many("items", &[doc(&[("_id", id_value(id))])])
            .unwrap();
        let ctx = fx
            .builder()
            .action_params(vec![
                doc(&[("name", json!("new"))]),
                doc(&[("_id", id_value(id)), ("name", json!("old"))]),
            ])
            .build()
            .unwrap();
        let err = save_records(&ctx).unwrap_err();
        assert_eq!(err.kind(), "saveError");
    }

    #[test]
    fn test_create_path_inserts_invalidates_and_audits() {
        let fx = Fixture::new();
        fx.cache
            .set(
                "items",
                "stale",
                json!([1]),
                std::time::Duration::from_secs(60),
            )
            .unwrap();
        let ctx = fx
            .builder()
            .action_params(vec![doc(&[("name", json!("X"))])])
            .exist_predicates(vec![Filter::eq("name", json!("X"))])
            .options(GuardOptions {
                log_create: true,
                ..Default::default()
            })
            .build()
            .unwrap();

        let outcome = save_records(&ctx).unwrap();
        assert_eq!(outcome.kind, SaveKind::Created);
        assert_eq!(outcome.count, 1);
        assert_eq!(fx.store.collection_len("items"), 1);
        assert_eq!(fx.cache.get("items", "stale").unwrap(), None);
        assert_eq!(fx.audit.len(), 1);
    }

    #[test]
    fn test_create_refused_on_uniqueness_conflict() {
        let fx = Fixture::new();
        fx.store
            .insert_many("items", &[doc(&[("code", json!("OY2b"))])])
            .unwrap();
        let ctx = fx
            .builder()
            .action_params(vec![doc(&[("code", json!("OY2b"))])])
            .exist_predicates(vec![Filter::eq("code", json!("OY2b"))])
            .build()
            .unwrap();
        let err = save_records(&ctx).unwrap_err();
        assert_eq!(err.kind(), "recExist");
        assert_eq!(fx.store.collection_len("items"), 1);
    }

    #[test]
    fn test_update_path_patches_by_id() {
        let fx = Fixture::new();
        let id = new_record_id();
        fx.store
            .insert_many(
                "items",
                &[doc(&[("_id", id_value(id)), ("name", json!("before"))])],
            )
            .unwrap();
        let ctx = fx
            .builder()
            .action_params(vec![doc(&[
                ("_id", id_value(id)),
                ("name", json!("after")),
            ])])
            .exist_predicates(vec![Filter::eq("name", json!("after"))
                .and("_id", FieldCondition::Ne(id_value(id)))])
            .build()
            .unwrap();

        let outcome = save_records(&ctx).unwrap();
        assert_eq!(outcome.kind, SaveKind::Updated);
        assert_eq!(outcome.count, 1);
        let stored = fx
            .store
            .find_one("items", &Filter::by_ids(&[id]))
            .unwrap()
            .unwrap();
        assert_eq!(stored["name"], json!("after"));
        assert!(stored.contains_key("updated_at"));
    }

    #[test]
    fn test_update_of_unknown_id_is_not_found() {
        let fx = Fixture::new();
        let ctx = fx
            .builder()
            .action_params(vec![doc(&[("_id", id_value(new_record_id()))])])
            .exist_predicates(vec![Filter::eq("name", json!("anything"))])
            .build()
            .unwrap();
        let err = save_records(&ctx).unwrap_err();
        assert_eq!(err.kind(), "notFound");
    }

    #[test]
    fn test_bulk_update_by_filter_patches_every_match() {
        let fx = Fixture::new();
        fx.store
            .insert_many(
                "items",
                &[
                    doc(&[("group", json!("g")), ("rank", json!(1))]),
                    doc(&[("group", json!("g")), ("rank", json!(1))]),
                    doc(&[("group", json!("other")), ("rank", json!(1))]),
                ],
            )
            .unwrap();
        let ctx = fx
            .builder()
            .action_params(vec![doc(&[("rank", json!(9))])])
            .query(Filter::eq("group", json!("g")))
            .exist_predicates(vec![Filter::eq("rank", json!(9))])
            .build()
            .unwrap();

        let outcome = save_records(&ctx).unwrap();
        assert_eq!(outcome.kind, SaveKind::Updated);
        assert_eq!(outcome.count, 2);
        assert_eq!(
            fx.store
                .count("items", &Filter::eq("rank", json!(9)))
                .unwrap(),
            2
        );
    }

    #[test]
    fn test_bulk_update_with_no_match_is_not_found() {
        let fx = Fixture::new();
        let ctx = fx
            .builder()
            .action_params(vec![doc(&[("rank", json!(9))])])
            .query(Filter::eq("group", json!("none")))
            .exist_predicates(vec![Filter::eq("rank", json!(9))])
            .build()
            .unwrap();
        let err = save_records(&ctx).unwrap_err();
        assert_eq!(err.kind(), "notFound");
    }

    #[test]
    fn test_update_audit_carries_before_and_after() {
        let fx = Fixture::new();
        let id = new_record_id();
        fx.store
            .insert_many(
                "items",
                &[doc(&[("_id", id_value(id)), ("n", json!(1))])],
            )
            .unwrap();
        let ctx = fx
            .builder()
            .action_params(vec![doc(&[("_id", id_value(id)), ("n", json!(2))])])
            .exist_predicates(vec![Filter::eq("n", json!(2))
                .and("_id", FieldCondition::Ne(id_value(id)))])
            .options(GuardOptions {
                log_update: true,
                ..Default::default()
            })
            .build()
            .unwrap();

        save_records(&ctx).unwrap();
        let event = &fx.audit.events()[0];
        assert_eq!(event.payload["before"][0]["n"], json!(1));
        assert_eq!(event.payload["after"][0]["n"], json!(2));
    }

    #[test]
    fn test_save_without_uniqueness_predicates_is_refused() {
        let fx = Fixture::new();
        fx.store
            .insert_many("items", &[doc(&[("code", json!("OY2b"))])])
            .unwrap();

        // create path: no predicates means no write, not a free pass
        let create = fx
            .builder()
            .action_params(vec![doc(&[("code", json!("OY2b"))])])
            .build()
            .unwrap();
        let err = save_records(&create).unwrap_err();
        assert_eq!(err.kind(), "integrityConditionMissing");
        assert_eq!(fx.store.collection_len("items"), 1);

        // update path refuses the same way
        let id = new_record_id();
        fx.store
            .insert_many("items", &[doc(&[("_id", id_value(id)), ("n", json!(1))])])
            .unwrap();
        let update = fx
            .builder()
            .action_params(vec![doc(&[("_id", id_value(id)), ("n", json!(2))])])
            .build()
            .unwrap();
        let err = save_records(&update).unwrap_err();
        assert_eq!(err.kind(), "integrityConditionMissing");
        let stored = fx
            .store
            .find_one("items", &Filter::by_ids(&[id]))
            .unwrap()
            .unwrap();
        assert_eq!(stored["n"], json!(1));
    }
}
