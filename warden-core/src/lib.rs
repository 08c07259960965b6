//! WARDEN Core - Guard-Layer Data Types
//!
//! Pure data structures with no business logic: documents and identifiers,
//! filters, actor/grant/decision types, request fingerprints, configuration
//! and the error taxonomy. The guard algorithms live in `warden-engine`;
//! collaborator traits and reference implementations in `warden-storage`.

pub mod access;
pub mod config;
pub mod document;
pub mod error;
pub mod filter;
pub mod fingerprint;
pub mod schema;

pub use access::{
    AccessDecision, AccessProfile, ActorContext, Capability, RoleGrant, TaskKind, UnknownTask,
};
pub use config::{GuardOptions, Relation, RelationModel};
pub use document::{
    doc_id, fields, has_concrete_id, id_value, new_record_id, Document, RecordId, Timestamp,
};
pub use error::{
    AuthError, ConfigInvalid, FieldError, IntegrityError, MutationError, ParamsError, StoreError,
    WardenError, WardenResult,
};
pub use filter::{FieldCondition, Filter, FindOptions, SortOrder};
pub use fingerprint::RequestFingerprint;
pub use schema::IdSchema;
