//! Existence and uniqueness checks
//!
//! Uniqueness is expressed as a list of "no other record may already match
//! this" predicates supplied with the request. Update-time predicates carry
//! a `_id != self` condition so a record never conflicts with itself.

use crate::context::RequestContext;
use warden_core::{Document, Filter, FindOptions, IntegrityError, RecordId, StoreError,
    WardenResult};

/// Check every uniqueness predicate against the target collection.
///
/// Predicates are probed in order and the first match short-circuits with
/// `RecordExists`, naming the conflicting attribute pairs. An empty
/// predicate list is a caller defect, not a pass.
pub fn check_exists(ctx: &RequestContext) -> WardenResult<()> {
    if ctx.exist_predicates.is_empty() {
        return Err(IntegrityError::ConditionMissing.into());
    }
    for predicate in &ctx.exist_predicates {
        if ctx.app_store.find_one(&ctx.collection, predicate)?.is_some() {
            return Err(IntegrityError::RecordExists {
                attributes: predicate.describe_attributes(),
            }
            .into());
        }
    }
    Ok(())
}

/// Load the current documents for an explicit id set.
///
/// Every requested id must resolve; a partial match is `NotFound`, never a
/// shorter success.
pub fn load_current_by_ids(
    ctx: &RequestContext,
    ids: &[RecordId],
) -> WardenResult<Vec<Document>> {
    let current = ctx.app_store.find(
        &ctx.collection,
        &Filter::by_ids(ids),
        &FindOptions::default(),
    )?;
    if current.len() != ids.len() {
        return Err(StoreError::NotFound {
            requested: ids.len(),
            found: current.len(),
        }
        .into());
    }
    Ok(current)
}

/// Load the current documents addressed by a query filter.
/// An empty result set is `NotFound`.
pub fn load_current_by_filter(
    ctx: &RequestContext,
    filter: &Filter,
) -> WardenResult<Vec<Document>> {
    let current = ctx
        .app_store
        .find(&ctx.collection, filter, &FindOptions::default())?;
    if current.is_empty() {
        return Err(StoreError::NotFound {
            requested: 0,
            found: 0,
        }
        .into());
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use warden_core::{id_value, new_record_id, FieldCondition};
    use warden_storage::{DocumentStore, MemoryAuditSink, MemoryCache, MemoryStore};

    fn doc(pairs: &[(&str, serde_json::Value)]) -> Document {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn ctx_with(store: Arc<MemoryStore>, predicates: Vec<Filter>) -> RequestContext {
        RequestContext::builder(
            store,
            Arc::new(MemoryCache::new()),
            Arc::new(MemoryAuditSink::new()),
            "items",
        )
        .exist_predicates(predicates)
        .build()
        .unwrap()
    }

    #[test]
    fn test_empty_predicate_list_is_condition_missing() {
        let ctx = ctx_with(Arc::new(MemoryStore::new()), vec![]);
        let err = check_exists(&ctx).unwrap_err();
        assert_eq!(err.kind(), "integrityConditionMissing");
    }

    #[test]
    fn test_first_conflicting_predicate_short_circuits() {
        let store = Arc::new(MemoryStore::new());
        // both predicates have a conflicting record in the store
        store
            .insert_many(
                "items",
                &[
                    doc(&[("code", json!("OY2b"))]),
                    doc(&[("name", json!("Oyo"))]),
                ],
            )
            .unwrap();
        let ctx = ctx_with(
            store,
            vec![
                Filter::eq("code", json!("OY2b")),
                Filter::eq("name", json!("Oyo")),
            ],
        );
        let err = check_exists(&ctx).unwrap_err();
        assert_eq!(err.kind(), "recExist");
        // only the first predicate's attributes are reported
        let msg = err.to_string();
        assert!(msg.contains("code: OY2b"));
        assert!(!msg.contains("Oyo"));
    }

    #[test]
    fn test_no_conflict_passes() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_many("items", &[doc(&[("code", json!("other"))])])
            .unwrap();
        let ctx = ctx_with(store, vec![Filter::eq("code", json!("OY2b"))]);
        assert!(check_exists(&ctx).is_ok());
    }

    #[test]
    fn test_update_predicate_excludes_self() {
        let store = Arc::new(MemoryStore::new());
        let id = new_record_id();
        store
            .insert_many(
                "items",
                &[doc(&[("_id", id_value(id)), ("code", json!("OY2b"))])],
            )
            .unwrap();
        // the only match is the record being updated
        let predicate = Filter::eq("code", json!("OY2b"))
            .and("_id", FieldCondition::Ne(id_value(id)));
        let ctx = ctx_with(store, vec![predicate]);
        assert!(check_exists(&ctx).is_ok());
    }

    #[test]
    fn test_load_by_ids_requires_every_id_to_resolve() {
        let store = Arc::new(MemoryStore::new());
        let (a, b) = (new_record_id(), new_record_id());
        store
            .insert_many("items", &[doc(&[("_id", id_value(a))])])
            .unwrap();
        let ctx = ctx_with(store, vec![]);

        let loaded = load_current_by_ids(&ctx, &[a]).unwrap();
        assert_eq!(loaded.len(), 1);

        let err = load_current_by_ids(&ctx, &[a, b]).unwrap_err();
        assert_eq!(err.kind(), "notFound");
        assert!(err.to_string().contains("2") && err.to_string().contains("1"));
    }

    #[test]
    fn test_load_by_filter_empty_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_many("items", &[doc(&[("group", json!("a"))])])
            .unwrap();
        let ctx = ctx_with(store, vec![]);

        let loaded = load_current_by_filter(&ctx, &Filter::eq("group", json!("a"))).unwrap();
        assert_eq!(loaded.len(), 1);

        let err = load_current_by_filter(&ctx, &Filter::eq("group", json!("zzz"))).unwrap_err();
        assert_eq!(err.kind(), "notFound");
    }
}
