//! Bulk load
//!
//! Server-side ETL pass-through: replace a collection's contents with the
//! request payload in one shot. No permission evaluation, no uniqueness
//! checks, no cache or audit coupling; this path is for trusted seeding
//! and migration jobs, not request traffic.

use crate::context::RequestContext;
use warden_core::{Filter, MutationError, ParamsError, WardenResult};

/// Hard cap on a single load payload, independent of the configured limit.
const MAX_LOAD_BATCH: u64 = 10_000;

/// Replace the collection's contents with the payload documents, returning
/// the inserted count.
pub fn load_records(ctx: &RequestContext) -> WardenResult<u64> {
    if ctx.action_params.is_empty() {
        return Err(
            ParamsError::single("action_params", "at least one document is required").into(),
        );
    }
    let cap = ctx.options.max_query_limit.min(MAX_LOAD_BATCH);
    if ctx.action_params.len() as u64 > cap {
        return Err(ParamsError::single(
            "action_params",
            format!("payload exceeds the load cap of {} documents", cap),
        )
        .into());
    }

    ctx.app_store.delete_many(&ctx.collection, &Filter::new())?;
    let inserted = ctx
        .app_store
        .insert_many(&ctx.collection, &ctx.action_params)?;
    if inserted == 0 {
        return Err(MutationError::InsertFailed {
            reason: "the store reported no inserted records".to_string(),
        }
        .into());
    }
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use warden_core::{Document, GuardOptions};
    use warden_storage::{DocumentStore, MemoryAuditSink, MemoryCache, MemoryStore};

    fn docs(n: usize) -> Vec<Document> {
        (0..n)
            .map(|i| {
                let mut doc = Document::new();
                doc.insert("n".to_string(), json!(i));
                doc
            })
            .collect()
    }

    fn ctx_with(
        store: Arc<MemoryStore>,
        payload: Vec<Document>,
        options: GuardOptions,
    ) -> RequestContext {
        RequestContext::builder(
            store,
            Arc::new(MemoryCache::new()),
            Arc::new(MemoryAuditSink::new()),
            "items",
        )
        .action_params(payload)
        .options(options)
        .build()
        .unwrap()
    }

    #[test]
    fn test_load_replaces_prior_contents() {
        let store = Arc::new(MemoryStore::new());
        store.insert_many("items", &docs(3)).unwrap();

        let ctx = ctx_with(store.clone(), docs(2), GuardOptions::default());
        assert_eq!(load_records(&ctx).unwrap(), 2);
        assert_eq!(store.collection_len("items"), 2);
    }

    #[test]
    fn test_empty_payload_is_params_error() {
        let ctx = ctx_with(Arc::new(MemoryStore::new()), vec![], GuardOptions::default());
        let err = load_records(&ctx).unwrap_err();
        assert_eq!(err.kind(), "paramsError");
    }

    #[test]
    fn test_payload_over_cap_is_refused_and_leaves_store_untouched() {
        let store = Arc::new(MemoryStore::new());
        store.insert_many("items", &docs(1)).unwrap();

        let options = GuardOptions {
            limit: 2,
            max_query_limit: 2,
            ..Default::default()
        };
        let ctx = ctx_with(store.clone(), docs(3), options);
        let err = load_records(&ctx).unwrap_err();
        assert_eq!(err.kind(), "paramsError");
        assert_eq!(store.collection_len("items"), 1);
    }
}
