use thiserror::Error;

use exactmatch_core::DomainError;

pub type StoreResult<T> = Result<T, StoreError>;

/// Store-level errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A referenced record does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// A uniqueness rule was violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Stored data could not be turned back into a domain value.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// The backend failed (connection, query, lock poisoning).
    #[error("store backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for DomainError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => DomainError::NotFound(what),
            StoreError::Conflict(msg) => DomainError::Conflict(msg),
            other => DomainError::invariant(other.to_string()),
        }
    }
}
