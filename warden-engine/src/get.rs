//! Read orchestration
//!
//! Reads are cache-first: the request fingerprint keys a probe into the
//! collection's cache namespace, and a hit returns without touching the
//! store. Cache and audit failures degrade to a store read with a warning;
//! only the store itself can fail a read. Addressing precedence is explicit
//! ids, then the query filter, then an unfiltered scan.

use crate::access;
use crate::context::RequestContext;
use serde_json::{json, Value};
use tracing::warn;
use warden_core::{Document, Filter, StoreError, TaskKind, WardenResult};

/// A read result and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct GetOutcome {
    pub value: Vec<Document>,
    pub from_cache: bool,
}

/// Fetch records by ids, by filter, or as a paged scan.
///
/// An empty result is `NotFound`; only non-empty results are cached, with
/// the configured `cache_expiry` TTL.
pub fn get_records(ctx: &RequestContext) -> WardenResult<GetOutcome> {
    if ctx.options.check_access {
        access::evaluate(ctx, TaskKind::Read, &ctx.doc_ids)?;
    }
    if ctx.options.log_read {
        audit_read(ctx);
    }

    if let Some(cached) = cache_probe(ctx) {
        return Ok(GetOutcome {
            value: cached,
            from_cache: true,
        });
    }

    let filter = if !ctx.doc_ids.is_empty() {
        Filter::by_ids(&ctx.doc_ids)
    } else {
        ctx.query.clone()
    };
    let value = ctx
        .app_store
        .find(&ctx.collection, &filter, &ctx.find_options)?;
    if value.is_empty() {
        return Err(StoreError::NotFound {
            requested: 0,
            found: 0,
        }
        .into());
    }

    cache_fill(ctx, &value);
    Ok(GetOutcome {
        value,
        from_cache: false,
    })
}

/// Probe the cache; a backend failure is a miss, not a read failure.
fn cache_probe(ctx: &RequestContext) -> Option<Vec<Document>> {
    match ctx.cache.get(&ctx.collection, &ctx.cache_key()) {
        Ok(Some(value)) => serde_json::from_value(value).ok(),
        Ok(None) => None,
        Err(err) => {
            warn!(collection = %ctx.collection, error = %err, "cache probe failed");
            None
        }
    }
}

fn cache_fill(ctx: &RequestContext, value: &[Document]) {
    let cached = Value::Array(value.iter().cloned().map(Value::Object).collect());
    if let Err(err) = ctx.cache.set(
        &ctx.collection,
        &ctx.cache_key(),
        cached,
        ctx.options.cache_expiry,
    ) {
        warn!(collection = %ctx.collection, error = %err, "cache fill failed");
    }
}

// Read audits are observational; a sink failure never fails the read.
pub(crate) fn audit_read(ctx: &RequestContext) {
    let Some(actor) = ctx.actor.as_ref() else {
        return;
    };
    let payload = if !ctx.doc_ids.is_empty() {
        json!({ "ids": ctx.doc_ids.iter().map(|id| id.to_string()).collect::<Vec<_>>() })
    } else {
        json!({ "filter": ctx.query.describe_attributes() })
    };
    if let Err(err) = ctx
        .audit
        .record_read(&ctx.collection, payload, actor.user_id)
    {
        warn!(collection = %ctx.collection, error = %err, "read audit failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use std::sync::Arc;
    use warden_core::{id_value, new_record_id, ActorContext, GuardOptions, SortOrder};
    use warden_storage::{DocumentStore, MemoryAuditSink, MemoryCache, MemoryStore};

    fn doc(pairs: &[(&str, Value)]) -> Document {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
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
        }
    }

    #[test]
    fn test_ids_take_precedence_over_filter() {
        let fx = Fixture::new();
        let id = new_record_id();
        fx.store
            .insert_many(
                "items",
                &[
                    doc(&[("_id", id_value(id)), ("group", json!("a"))]),
                    doc(&[("group", json!("b"))]),
                ],
            )
            .unwrap();
        let ctx = fx
            .builder()
            .doc_ids(vec![id])
            .query(Filter::eq("group", json!("b")))
            .build()
            .unwrap();

        let outcome = get_records(&ctx).unwrap();
        assert_eq!(outcome.value.len(), 1);
        assert_eq!(outcome.value[0]["group"], json!("a"));
        assert!(!outcome.from_cache);
    }

    #[test]
    fn test_empty_result_is_not_found_and_not_cached() {
        let fx = Fixture::new();
        let ctx = fx
            .builder()
            .query(Filter::eq("group", json!("missing")))
            .build()
            .unwrap();
        let err = get_records(&ctx).unwrap_err();
        assert_eq!(err.kind(), "notFound");
        assert!(fx.cache.is_empty());
    }

    #[test]
    fn test_second_identical_read_is_served_from_cache() {
        let fx = Fixture::new();
        fx.store
            .insert_many("items", &[doc(&[("group", json!("a"))])])
            .unwrap();
        let make = || {
            fx.builder()
                .query(Filter::eq("group", json!("a")))
                .build()
                .unwrap()
        };

        let first = get_records(&make()).unwrap();
        assert!(!first.from_cache);

        // mutate the store behind the cache; the cached value still serves
        fx.store.clear();
        let second = get_records(&make()).unwrap();
        assert!(second.from_cache);
        assert_eq!(second.value, first.value);
    }

    #[test]
    fn test_different_query_shapes_have_distinct_cache_entries() {
        let fx = Fixture::new();
        fx.store
            .insert_many(
                "items",
                &[
                    doc(&[("group", json!("a"))]),
                    doc(&[("group", json!("b"))]),
                ],
            )
            .unwrap();

        let by_a = fx
            .builder()
            .query(Filter::eq("group", json!("a")))
            .build()
            .unwrap();
        let by_b = fx
            .builder()
            .query(Filter::eq("group", json!("b")))
            .build()
            .unwrap();
        get_records(&by_a).unwrap();
        get_records(&by_b).unwrap();
        assert_eq!(fx.cache.len(), 2);
        assert_ne!(by_a.cache_key(), by_b.cache_key());
    }

    #[test]
    fn test_unfiltered_scan_applies_sort_and_paging() {
        let fx = Fixture::new();
        fx.store
            .insert_many(
                "items",
                &[
                    doc(&[("name", json!("c"))]),
                    doc(&[("name", json!("a"))]),
                    doc(&[("name", json!("b"))]),
                ],
            )
            .unwrap();
        let ctx = fx
            .builder()
            .sort(vec![("name".to_string(), SortOrder::Asc)])
            .skip(1)
            .limit(1)
            .build()
            .unwrap();

        let outcome = get_records(&ctx).unwrap();
        assert_eq!(outcome.value.len(), 1);
        assert_eq!(outcome.value[0]["name"], json!("b"));
    }

    #[test]
    fn test_read_audit_failure_does_not_fail_the_read() {
        struct FailingSink;
        impl warden_storage::AuditSink for FailingSink {
            fn record_create(
                &self,
                _: &str,
                _: Value,
                _: warden_core::RecordId,
            ) -> WardenResult<()> {
                Err(StoreError::Connection {
                    reason: "sink down".to_string(),
                }
                .into())
            }
            fn record_update(
                &self,
                _: &str,
                _: Value,
                _: Value,
                _: warden_core::RecordId,
            ) -> WardenResult<()> {
                Err(StoreError::Connection {
                    reason: "sink down".to_string(),
                }
                .into())
            }
            fn record_delete(
                &self,
                _: &str,
                _: Value,
                _: warden_core::RecordId,
            ) -> WardenResult<()> {
                Err(StoreError::Connection {
                    reason: "sink down".to_string(),
                }
                .into())
            }
            fn record_read(
                &self,
                _: &str,
                _: Value,
                _: warden_core::RecordId,
            ) -> WardenResult<()> {
                Err(StoreError::Connection {
                    reason: "sink down".to_string(),
                }
                .into())
            }
        }

        let store = Arc::new(MemoryStore::new());
        store
            .insert_many("items", &[doc(&[("group", json!("a"))])])
            .unwrap();
        let ctx = RequestContext::builder(
            store,
            Arc::new(MemoryCache::new()),
            Arc::new(FailingSink),
            "items",
        )
        .actor(ActorContext {
            user_id: new_record_id(),
            token: "tok".to_string(),
            login_name: "abbey".to_string(),
            expires_at: Utc::now() + Duration::hours(1),
            first_name: String::new(),
            last_name: String::new(),
            language: "en-US".to_string(),
        })
        .options(GuardOptions {
            log_read: true,
            ..Default::default()
        })
        .build()
        .unwrap();

        assert!(get_records(&ctx).is_ok());
    }
}
