//! Error types for the Hearth state store.

use thiserror::Error;

/// Result type alias for state store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during state store operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("precondition failed for {table}/{key}")]
    ConditionFailed { table: &'static str, key: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("already locked: {0}")]
    AlreadyLocked(String),
}

impl StateError {
    /// True when the store itself was reachable and only the precondition failed.
    pub fn is_condition_failed(&self) -> bool {
        matches!(self, StateError::ConditionFailed { .. })
    }
}
