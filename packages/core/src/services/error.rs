//! Service Layer Error Types
//!
//! Errors raised while planning or running upgrade steps. Only
//! [`MigrationError::UnsupportedVersion`] is fatal; everything else
//! is contained at entity or tenant granularity by the bulk updater unless it
//! happens while fetching a page.

use crate::db::DatabaseError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MigrationError {
    /// No upgrade path is registered for the given source version
    #[error("Unable to update data, unsupported fromVersion: {version}")]
    UnsupportedVersion { version: String },

    /// Storage collaborator failed
    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),

    /// A record referenced by the data being migrated does not exist
    #[error("{entity_type} not found: {id}")]
    EntityNotFound { entity_type: String, id: String },

    /// A document did not have the shape the migration expects
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// A full batch was processed without shrinking the remaining work
    #[error("No progress rewriting {context}")]
    NoProgress { context: String },
}

impl MigrationError {
    pub fn unsupported_version(version: impl Into<String>) -> Self {
        Self::UnsupportedVersion {
            version: version.into(),
        }
    }

    pub fn entity_not_found(entity_type: impl Into<String>, id: impl ToString) -> Self {
        Self::EntityNotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    pub fn invalid_document(msg: impl Into<String>) -> Self {
        Self::InvalidDocument(msg.into())
    }

    pub fn no_progress(context: impl Into<String>) -> Self {
        Self::NoProgress {
            context: context.into(),
        }
    }

    /// Whether the whole upgrade must stop rather than skip one entity
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::UnsupportedVersion { .. })
    }
}
