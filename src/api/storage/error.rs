//! Storage error types for repositories and the change request store.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Storage operation errors.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageError {
    /// Entity not found
    #[error("Entity not found: {entity_type} with id {entity_id}")]
    NotFound {
        entity_type: String,
        entity_id: String,
    },
    /// Remote document store answered with a non-success status
    #[error("Remote store returned {status}: {body}")]
    Remote { status: u16, body: String },
    /// Database or network connection error
    #[error("Connection error: {0}")]
    ConnectionError(String),
    /// Stored data could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// General storage error
    #[error("Storage error: {0}")]
    Other(String),
}

impl StorageError {
    pub fn not_found(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        StorageError::NotFound {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
        }
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        StorageError::ConnectionError(e.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}
