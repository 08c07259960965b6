//! Audit sink trait and implementations
//!
//! Append-only record of create/update/delete/read events. Sink failures
//! are the orchestration's to swallow: audit writes are fire-and-forget
//! from the guard's perspective and never change the parent outcome.

use crate::DocumentStore;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::{Arc, RwLock};
use warden_core::{Document, RecordId, StoreError, Timestamp, WardenError, WardenResult};

/// The audited action kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Read,
}

/// One appended audit event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub action: AuditAction,
    pub collection: String,
    pub payload: Value,
    pub actor_id: RecordId,
    pub recorded_at: Timestamp,
}

/// Audit sink contract.
pub trait AuditSink: Send + Sync {
    fn record_create(&self, collection: &str, payload: Value, actor_id: RecordId)
        -> WardenResult<()>;

    /// Update events carry both the pre-mutation snapshot and the patch.
    fn record_update(
        &self,
        collection: &str,
        before: Value,
        after: Value,
        actor_id: RecordId,
    ) -> WardenResult<()>;

    fn record_delete(&self, collection: &str, payload: Value, actor_id: RecordId)
        -> WardenResult<()>;

    fn record_read(&self, collection: &str, payload: Value, actor_id: RecordId)
        -> WardenResult<()>;
}

/// In-memory audit sink retaining events for assertions.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: RwLock<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.read().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.events.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, event: AuditEvent) -> WardenResult<()> {
        let mut events = self.events.write().map_err(|_| {
            WardenError::Store(StoreError::Connection {
                reason: "audit lock poisoned".to_string(),
            })
        })?;
        events.push(event);
        Ok(())
    }
}

impl AuditSink for MemoryAuditSink {
    fn record_create(
        &self,
        collection: &str,
        payload: Value,
        actor_id: RecordId,
    ) -> WardenResult<()> {
        self.push(AuditEvent {
            action: AuditAction::Create,
            collection: collection.to_string(),
            payload,
            actor_id,
            recorded_at: Utc::now(),
        })
    }

    fn record_update(
        &self,
        collection: &str,
        before: Value,
        after: Value,
        actor_id: RecordId,
    ) -> WardenResult<()> {
        self.push(AuditEvent {
            action: AuditAction::Update,
            collection: collection.to_string(),
            payload: json!({ "before": before, "after": after }),
            actor_id,
            recorded_at: Utc::now(),
        })
    }

    fn record_delete(
        &self,
        collection: &str,
        payload: Value,
        actor_id: RecordId,
    ) -> WardenResult<()> {
        self.push(AuditEvent {
            action: AuditAction::Delete,
            collection: collection.to_string(),
            payload,
            actor_id,
            recorded_at: Utc::now(),
        })
    }

    fn record_read(
        &self,
        collection: &str,
        payload: Value,
        actor_id: RecordId,
    ) -> WardenResult<()> {
        self.push(AuditEvent {
            action: AuditAction::Read,
            collection: collection.to_string(),
            payload,
            actor_id,
            recorded_at: Utc::now(),
        })
    }
}

/// Audit sink that appends events as documents into a store collection.
pub struct StoreAuditSink {
    store: Arc<dyn DocumentStore>,
    audit_collection: String,
}

impl StoreAuditSink {
    pub fn new(store: Arc<dyn DocumentStore>, audit_collection: impl Into<String>) -> Self {
        Self {
            store,
            audit_collection: audit_collection.into(),
        }
    }

    fn append(&self, action: &str, collection: &str, payload: Value, actor_id: RecordId)
        -> WardenResult<()> {
        let mut doc = Document::new();
        doc.insert("action".to_string(), json!(action));
        doc.insert("collection".to_string(), json!(collection));
        doc.insert("payload".to_string(), payload);
        doc.insert("actor_id".to_string(), json!(actor_id.to_string()));
        doc.insert("recorded_at".to_string(), json!(Utc::now().to_rfc3339()));
        self.store.insert_many(&self.audit_collection, &[doc])?;
        Ok(())
    }
}

impl AuditSink for StoreAuditSink {
    fn record_create(
        &self,
        collection: &str,
        payload: Value,
        actor_id: RecordId,
    ) -> WardenResult<()> {
        self.append("create", collection, payload, actor_id)
    }

    fn record_update(
        &self,
        collection: &str,
        before: Value,
        after: Value,
        actor_id: RecordId,
    ) -> WardenResult<()> {
        self.append(
            "update",
            collection,
            json!({ "before": before, "after": after }),
            actor_id,
        )
    }

    fn record_delete(
        &self,
        collection: &str,
        payload: Value,
        actor_id: RecordId,
    ) -> WardenResult<()> {
        self.append("delete", collection, payload, actor_id)
    }

    fn record_read(
        &self,
        collection: &str,
        payload: Value,
        actor_id: RecordId,
    ) -> WardenResult<()> {
        self.append("read", collection, payload, actor_id)
    }
}
