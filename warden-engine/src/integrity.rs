//! Referential-integrity checks for deletes
//!
//! The store has no foreign keys underneath, so these checks are advisory:
//! they run before the delete and block it when any record still has
//! dependents. Two probes cover the relation model: a self-referential
//! probe on the target collection's own `parent_id` links, and one probe
//! per declared child collection. Every offending collection is named in
//! the error, so a single failure report covers the whole cleanup.

use crate::context::RequestContext;
use warden_core::{fields, Filter, IntegrityError, RecordId, WardenResult};

/// Block deletion while any requested record still has dependent records.
///
/// An empty child-collection list means only the self-referential probe
/// runs. Probes are reads only; nothing is mutated here.
pub fn check_deletable(ctx: &RequestContext, record_ids: &[RecordId]) -> WardenResult<()> {
    if record_ids.is_empty() {
        return Ok(());
    }
    let probe = Filter::field_in(fields::PARENT_ID, record_ids);

    let mut offending: Vec<String> = vec![];
    if ctx.app_store.find_one(&ctx.collection, &probe)?.is_some() {
        offending.push(ctx.collection.clone());
    }
    for child in &ctx.options.child_collections {
        if child == &ctx.collection {
            continue;
        }
        if ctx.app_store.find_one(child, &probe)?.is_some() {
            offending.push(child.clone());
        }
    }

    if offending.is_empty() {
        Ok(())
    } else {
        Err(IntegrityError::HasSubItems {
            collections: offending,
        }
        .into())
    }
}
