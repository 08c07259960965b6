//! Immutable per-request context
//!
//! One value object carries everything a guard function needs: collaborator
//! handles, the target collection, the actor, the payload and query shape,
//! and the process configuration. Guard functions are free-standing and
//! take `&RequestContext`; nothing here is mutated after `build()`.

use std::sync::Arc;
use warden_core::{
    ActorContext, Document, Filter, FindOptions, GuardOptions, IdSchema, RecordId,
    RequestFingerprint, SortOrder, StoreError, WardenResult,
};
use warden_storage::{AuditSink, CacheBackend, DocumentStore};

/// Request-scoped, immutable guard context.
pub struct RequestContext {
    /// Application data store.
    pub app_store: Arc<dyn DocumentStore>,
    /// Store holding access keys, users, roles and services. Defaults to
    /// the application store.
    pub access_store: Arc<dyn DocumentStore>,
    pub cache: Arc<dyn CacheBackend>,
    pub audit: Arc<dyn AuditSink>,
    /// Target collection of this request.
    pub collection: String,
    pub actor: Option<ActorContext>,
    /// Documents to write (save/load tasks).
    pub action_params: Vec<Document>,
    /// Uniqueness predicates: "no other record may already match this".
    pub exist_predicates: Vec<Filter>,
    /// Explicit target record identifiers.
    pub doc_ids: Vec<RecordId>,
    /// Query filter for filter-addressed tasks.
    pub query: Filter,
    /// Projection/sort/paging, already clamped to the configured limits.
    pub find_options: FindOptions,
    pub options: GuardOptions,
    /// Cache key for this request's query shape, computed once.
    pub fingerprint: RequestFingerprint,
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("collection", &self.collection)
            .field("actor", &self.actor)
            .field("action_params", &self.action_params)
            .field("exist_predicates", &self.exist_predicates)
            .field("doc_ids", &self.doc_ids)
            .field("query", &self.query)
            .field("find_options", &self.find_options)
            .field("options", &self.options)
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}

impl RequestContext {
    pub fn builder(
        app_store: Arc<dyn DocumentStore>,
        cache: Arc<dyn CacheBackend>,
        audit: Arc<dyn AuditSink>,
        collection: impl Into<String>,
    ) -> RequestContextBuilder {
        RequestContextBuilder {
            app_store,
            access_store: None,
            cache,
            audit,
            collection: collection.into(),
            actor: None,
            action_params: vec![],
            exist_predicates: vec![],
            doc_ids: vec![],
            query: Filter::new(),
            projection: vec![],
            sort: vec![],
            skip: None,
            limit: None,
            schema: IdSchema::new(),
            options: GuardOptions::default(),
        }
    }

    /// The hex cache key for this request within the collection namespace.
    pub fn cache_key(&self) -> String {
        self.fingerprint.to_hex()
    }

    /// Drop every cached read for this collection after a confirmed write.
    /// A failed sweep is logged and swallowed; the write itself stands.
    pub fn invalidate_cache(&self) {
        if let Err(err) = self.cache.invalidate_namespace(&self.collection) {
            tracing::warn!(
                collection = %self.collection,
                error = %err,
                "cache invalidation failed after write"
            );
        }
    }
}

/// Assembles a validated `RequestContext`.
pub struct RequestContextBuilder {
    app_store: Arc<dyn DocumentStore>,
    access_store: Option<Arc<dyn DocumentStore>>,
    cache: Arc<dyn CacheBackend>,
    audit: Arc<dyn AuditSink>,
    collection: String,
    actor: Option<ActorContext>,
    action_params: Vec<Document>,
    exist_predicates: Vec<Filter>,
    doc_ids: Vec<RecordId>,
    query: Filter,
    projection: Vec<String>,
    sort: Vec<(String, SortOrder)>,
    skip: Option<u64>,
    limit: Option<u64>,
    schema: IdSchema,
    options: GuardOptions,
}

impl RequestContextBuilder {
    /// Use a separate store for access keys, users, roles and services.
    pub fn access_store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.access_store = Some(store);
        self
    }

    pub fn actor(mut self, actor: ActorContext) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn action_params(mut self, docs: Vec<Document>) -> Self {
        self.action_params = docs;
        self
    }

    pub fn exist_predicates(mut self, predicates: Vec<Filter>) -> Self {
        self.exist_predicates = predicates;
        self
    }

    pub fn doc_ids(mut self, ids: Vec<RecordId>) -> Self {
        self.doc_ids = ids;
        self
    }

    pub fn query(mut self, filter: Filter) -> Self {
        self.query = filter;
        self
    }

    pub fn projection(mut self, fields: Vec<String>) -> Self {
        self.projection = fields;
        self
    }

    pub fn sort(mut self, keys: Vec<(String, SortOrder)>) -> Self {
        self.sort = keys;
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Identifier-field declarations applied to the payload at build time.
    pub fn id_schema(mut self, schema: IdSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn options(mut self, options: GuardOptions) -> Self {
        self.options = options;
        self
    }

    /// Validate handles and configuration, canonicalize identifier fields,
    /// clamp paging, and compute the request fingerprint.
    pub fn build(self) -> WardenResult<RequestContext> {
        self.options.validate()?;
        if self.collection.is_empty() {
            return Err(StoreError::InvalidHandle {
                reason: "target collection name is required".to_string(),
            }
            .into());
        }

        let mut action_params = self.action_params;
        for doc in &mut action_params {
            self.schema.normalize(&self.collection, doc)?;
        }

        let skip = self.skip.unwrap_or(self.options.skip);
        let limit = self
            .limit
            .unwrap_or(self.options.limit)
            .clamp(1, self.options.max_query_limit);
        let find_options = FindOptions {
            skip,
            limit: Some(limit),
            projection: self.projection,
            sort: self.sort,
        };

        let fingerprint = RequestFingerprint::compute(
            &self.collection,
            &self.query,
            &find_options,
            &self.doc_ids,
        );

        Ok(RequestContext {
            access_store: self.access_store.unwrap_or_else(|| self.app_store.clone()),
            app_store: self.app_store,
            cache: self.cache,
            audit: self.audit,
            collection: self.collection,
            actor: self.actor,
            action_params,
            exist_predicates: self.exist_predicates,
            doc_ids: self.doc_ids,
            query: self.query,
            find_options,
            options: self.options,
            fingerprint,
        })
    }
}
