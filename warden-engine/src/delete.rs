//! Delete orchestration
//!
//! Deletes are addressed by explicit ids or by a query filter, never both
//! implicitly. Both paths load the pre-delete snapshot first: the id path
//! to confirm every target exists, the filter path to re-derive the id set
//! for permission and integrity checks. The snapshot is also what the
//! audit event carries, since the records are gone afterwards.

use crate::access;
use crate::context::RequestContext;
use crate::exists;
use crate::integrity;
use serde_json::Value;
use tracing::warn;
use warden_core::{Document, Filter, MutationError, RecordId, TaskKind, WardenResult};

/// Delete the records addressed by the request, returning the deleted
/// count. Zero targets, a missing target, or dependent child records all
/// refuse the delete before the store is touched.
pub fn delete_records(ctx: &RequestContext) -> WardenResult<u64> {
    if ctx.doc_ids.is_empty() && ctx.query.is_empty() {
        return Err(MutationError::RemoveFailed {
            reason: "no record ids or query filter were provided".to_string(),
        }
        .into());
    }

    let (filter, snapshot) = if !ctx.doc_ids.is_empty() {
        if ctx.options.check_access {
            access::evaluate(ctx, TaskKind::Delete, &ctx.doc_ids)?;
        }
        let snapshot = exists::load_current_by_ids(ctx, &ctx.doc_ids)?;
        integrity::check_deletable(ctx, &ctx.doc_ids)?;
        (Filter::by_ids(&ctx.doc_ids), snapshot)
    } else {
        let snapshot = exists::load_current_by_filter(ctx, &ctx.query)?;
        if ctx.options.check_access {
            access::evaluate_by_current_records(ctx, TaskKind::Delete, &snapshot)?;
        }
        let ids: Vec<RecordId> = snapshot.iter().filter_map(warden_core::doc_id).collect();
        integrity::check_deletable(ctx, &ids)?;
        (ctx.query.clone(), snapshot)
    };

    let deleted = ctx.app_store.delete_many(&ctx.collection, &filter)?;
    if deleted == 0 {
        return Err(MutationError::RemoveFailed {
            reason: "the store reported no deleted records".to_string(),
        }
        .into());
    }

    ctx.invalidate_cache();
    if ctx.options.log_delete {
        audit_delete(ctx, &snapshot);
    }
    Ok(deleted)
}

// Carries the pre-delete snapshot; failures never fail the delete.
fn audit_delete(ctx: &RequestContext, snapshot: &[Document]) {
    let Some(actor) = ctx.actor.as_ref() else {
        return;
    };
    let payload = Value::Array(snapshot.iter().cloned().map(Value::Object).collect());
    if let Err(err) = ctx
        .audit
        .record_delete(&ctx.collection, payload, actor.user_id)
    {
        warn!(collection = %ctx.collection, error = %err, "delete audit failed");
    }
}
