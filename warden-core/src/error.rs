//! Error types for WARDEN guard operations
//!
//! Every public operation returns a structured error carrying a stable
//! `kind()` discriminant, so callers can branch without inspecting message
//! text.

use thiserror::Error;

/// Permission-evaluator denials.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: String },

    #[error("Access expired: please login to continue")]
    TokenExpired,
}

/// Uniqueness and referential-integrity guard failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IntegrityError {
    #[error("Record with similar combined attributes [{attributes}] exists. Provide unique record attributes to create or update record(s).")]
    RecordExists { attributes: String },

    #[error("Integrity condition not specified/missing: unable to verify integrity conflict")]
    ConditionMissing,

    #[error("A record that includes sub-items cannot be deleted. Delete/remove the sub-items [from {}] first.", .collections.join(", "))]
    HasSubItems { collections: Vec<String> },
}

/// Store-level failures after guards passed, and save-path selection errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MutationError {
    #[error("Error inserting/creating new record(s): {reason}")]
    InsertFailed { reason: String },

    #[error("Error updating record(s): {reason}")]
    UpdateFailed { reason: String },

    #[error("Error removing/deleting record(s): {reason}")]
    RemoveFailed { reason: String },

    #[error("Error performing the requested save operation: {reason}")]
    SaveConflict { reason: String },
}

/// Backing-store adapter errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Requested record(s) not found: {found} of {requested} matched")]
    NotFound { requested: usize, found: usize },

    #[error("Store connection error: {reason}")]
    Connection { reason: String },

    #[error("Invalid store handle: {reason}")]
    InvalidHandle { reason: String },
}

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

fn render_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Malformed or missing request shape, caught before any guard runs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid request parameters: {}", render_field_errors(.errors))]
pub struct ParamsError {
    pub errors: Vec<FieldError>,
}

impl ParamsError {
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            errors: vec![FieldError::new(field, message)],
        }
    }
}

/// Invalid configuration value, rejected at construction time.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid value for {field}: {value} - {reason}")]
pub struct ConfigInvalid {
    pub field: String,
    pub value: String,
    pub reason: String,
}

/// Master error type for all WARDEN errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WardenError {
    #[error("Authorization error: {0}")]
    Auth(#[from] AuthError),

    #[error("Integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    #[error("Mutation error: {0}")]
    Mutation(#[from] MutationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Params(#[from] ParamsError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigInvalid),
}

impl WardenError {
    /// Stable discriminant for caller-side branching.
    pub fn kind(&self) -> &'static str {
        match self {
            WardenError::Auth(AuthError::Unauthorized { .. }) => "unAuthorized",
            WardenError::Auth(AuthError::TokenExpired) => "tokenExpired",
            WardenError::Integrity(IntegrityError::RecordExists { .. }) => "recExist",
            WardenError::Integrity(IntegrityError::ConditionMissing) => {
                "integrityConditionMissing"
            }
            WardenError::Integrity(IntegrityError::HasSubItems { .. }) => "subItems",
            WardenError::Mutation(MutationError::InsertFailed { .. }) => "insertError",
            WardenError::Mutation(MutationError::UpdateFailed { .. }) => "updateError",
            WardenError::Mutation(MutationError::RemoveFailed { .. }) => "removeError",
            WardenError::Mutation(MutationError::SaveConflict { .. }) => "saveError",
            WardenError::Store(StoreError::NotFound { .. }) => "notFound",
            WardenError::Store(StoreError::Connection { .. }) => "storeError",
            WardenError::Store(StoreError::InvalidHandle { .. }) => "paramsError",
            WardenError::Params(_) => "paramsError",
            WardenError::Config(_) => "configError",
        }
    }
}

/// Result type alias for WARDEN operations.
pub type WardenResult<T> = Result<T, WardenError>;
