//! Error types for engine operations.

use thiserror::Error;

use crate::db::{SubjectRef, Table};

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced by the engagement and reputation engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A mutating call arrived without an acting user (or from one who may
    /// not act on the target)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The subject or record does not exist
    #[error("Not found: {table} row {id}")]
    NotFound { table: Table, id: String },

    /// The record store rejected a read or write
    #[error("Record store failure: {0:#}")]
    StoreFailure(#[from] anyhow::Error),

    /// The stored counter could not be updated or read, and the reported
    /// value was recomputed from membership rows instead
    #[error("Inconsistent counter on {subject}: {reason}")]
    InconsistentCounter { subject: SubjectRef, reason: String },

    /// Input rejected at validation time (unknown action name, bad id)
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl EngineError {
    pub fn unauthenticated() -> Self {
        EngineError::Unauthorized("no authenticated user".to_string())
    }

    pub fn not_found(table: Table, id: impl ToString) -> Self {
        EngineError::NotFound {
            table,
            id: id.to_string(),
        }
    }
}
