//! Database Error Types
//!
//! Errors raised by storage collaborators. Service-layer code wraps these in
//! `MigrationError` so callers can tell store failures from migration logic
//! failures.

use std::path::PathBuf;
use thiserror::Error;

/// Storage operation errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// A point read referenced a record that does not exist
    #[error("{entity_type} not found: {id}")]
    NotFound { entity_type: String, id: String },

    /// Write rejected by a store-enforced invariant
    #[error("Constraint violated: {0}")]
    ConstraintViolation(String),

    /// Backend-specific failure (connection, query, injected fault)
    #[error("Database operation failed: {0}")]
    Backend(String),

    /// Snapshot file could not be read or written
    #[error("Failed to access snapshot at {path}: {source}")]
    SnapshotIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DatabaseError {
    pub fn not_found(entity_type: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    pub fn constraint_violation(msg: impl Into<String>) -> Self {
        Self::ConstraintViolation(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    pub fn snapshot_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::SnapshotIo {
            path: path.into(),
            source,
        }
    }
}
