//! Streaming read orchestration
//!
//! The streaming variant of the read path: the same permission and audit
//! preamble as [`crate::get`], but instead of materializing one response it
//! hands back an iterator that pages through the store. The cache is
//! bypassed on both ends; a page of a cursor is not a cacheable query
//! shape. The clamped request limit becomes the page size, the request
//! skip the starting offset.

use crate::access;
use crate::context::RequestContext;
use crate::get;
use std::sync::Arc;
use warden_core::{Document, Filter, FindOptions, TaskKind, WardenResult};
use warden_storage::DocumentStore;

/// Open a paged stream over the records addressed by the request.
///
/// Addressing precedence matches `get_records`: explicit ids, then the
/// query filter, then an unfiltered scan. A stream over no matches is
/// simply exhausted; only permission failures and store errors surface.
pub fn stream_records(ctx: &RequestContext) -> WardenResult<RecordStream> {
    if ctx.options.check_access {
        access::evaluate(ctx, TaskKind::Read, &ctx.doc_ids)?;
    }
    if ctx.options.log_read {
        get::audit_read(ctx);
    }

    let filter = if !ctx.doc_ids.is_empty() {
        Filter::by_ids(&ctx.doc_ids)
    } else {
        ctx.query.clone()
    };
    Ok(RecordStream::new(
        ctx.app_store.clone(),
        ctx.collection.clone(),
        filter,
        &ctx.find_options,
    ))
}

/// A lazy, paging iterator over matching documents.
///
/// Each exhausted page triggers one `find` for the next; a page shorter
/// than the page size marks the end. A store failure is yielded once as an
/// `Err` item and the stream is exhausted afterwards.
pub struct RecordStream {
    store: Arc<dyn DocumentStore>,
    collection: String,
    filter: Filter,
    projection: Vec<String>,
    sort: Vec<(String, warden_core::SortOrder)>,
    offset: u64,
    page_size: u64,
    page: std::vec::IntoIter<Document>,
    done: bool,
}

impl std::fmt::Debug for RecordStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStream")
            .field("collection", &self.collection)
            .field("filter", &self.filter)
            .field("projection", &self.projection)
            .field("sort", &self.sort)
            .field("offset", &self.offset)
            .field("page_size", &self.page_size)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl RecordStream {
    fn new(
        store: Arc<dyn DocumentStore>,
        collection: String,
        filter: Filter,
        find_options: &FindOptions,
    ) -> Self {
        Self {
            store,
            collection,
            filter,
            projection: find_options.projection.clone(),
            sort: find_options.sort.clone(),
            offset: find_options.skip,
            // the builder clamps limit to at least 1, but a hand-built
            // FindOptions may carry None
            page_size: find_options.limit.unwrap_or(100).max(1),
            page: Vec::new().into_iter(),
            done: false,
        }
    }

    fn fetch_page(&mut self) -> WardenResult<Vec<Document>> {
        let options = FindOptions {
            skip: self.offset,
            limit: Some(self.page_size),
            projection: self.projection.clone(),
            sort: self.sort.clone(),
        };
        let page = self.store.find(&self.collection, &self.filter, &options)?;
        self.offset += page.len() as u64;
        if (page.len() as u64) < self.page_size {
            self.done = true;
        }
        Ok(page)
    }
}

impl Iterator for RecordStream {
    type Item = WardenResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(doc) = self.page.next() {
            return Some(Ok(doc));
        }
        if self.done {
            return None;
        }
        match self.fetch_page() {
            Ok(page) => {
                self.page = page.into_iter();
                self.page.next().map(Ok)
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
