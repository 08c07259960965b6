//! WARDEN Engine - Guard Layer Orchestrations
//!
//! The guard layer sits between inbound CRUD requests and the backing
//! document store. Every mutating or reading task flows through the same
//! sequence: request-shape validation, permission evaluation, uniqueness
//! and referential-integrity checks, the store operation, and finally
//! write-coupled cache invalidation plus audit. Guards are free-standing
//! functions over an immutable [`RequestContext`]; a failed guard
//! short-circuits before the store is touched.

pub mod access;
pub mod context;
pub mod delete;
pub mod exists;
pub mod get;
pub mod integrity;
pub mod load;
pub mod save;
pub mod stream;

pub use access::{check_task_access, evaluate, evaluate_by_current_records};
pub use context::{RequestContext, RequestContextBuilder};
pub use delete::delete_records;
pub use exists::{check_exists, load_current_by_filter, load_current_by_ids};
pub use get::{get_records, GetOutcome};
pub use integrity::check_deletable;
pub use load::load_records;
pub use save::{partition_items, save_records, SaveKind, SaveOutcome, SavePartition};
pub use stream::{stream_records, RecordStream};
