//! Storage trait definitions for entity repositories and the change request store.

use crate::models::{Application, ChangeRequest, Review};
use serde_json::Value;
use uuid::Uuid;

/// CRUD collaborator for one entity collection (products, sales or purchases).
#[async_trait::async_trait]
pub trait EntityRepository: Send + Sync {
    /// Create a record and return it as persisted
    async fn add(&self, data: Value) -> Result<Value, super::StorageError>;

    /// Merge `data` into an existing record and return the updated record
    async fn update(&self, id: &str, data: Value) -> Result<Value, super::StorageError>;

    /// Remove a record
    async fn delete(&self, id: &str) -> Result<(), super::StorageError>;
}

/// Result of an attempted review transition.
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewTransition {
    /// No request with that id
    NotFound,
    /// The request had already been reviewed; it is returned unchanged
    AlreadyReviewed(ChangeRequest),
    /// The request moved out of pending; it is returned with the review applied
    Reviewed(ChangeRequest),
}

/// Persistence port for change requests.
#[async_trait::async_trait]
pub trait ChangeRequestStore: Send + Sync {
    /// Store a new request
    async fn insert(&self, request: ChangeRequest) -> Result<ChangeRequest, super::StorageError>;

    /// Get a request by ID
    async fn get(&self, id: Uuid) -> Result<Option<ChangeRequest>, super::StorageError>;

    /// List all requests in submission order
    async fn list(&self) -> Result<Vec<ChangeRequest>, super::StorageError>;

    /// Apply a review if, and only if, the request is still pending.
    ///
    /// Implementations must make the status check and the write a single atomic step.
    async fn review(
        &self,
        id: Uuid,
        review: &Review,
    ) -> Result<ReviewTransition, super::StorageError>;

    /// Record the outcome of replaying an approved request
    async fn record_application(
        &self,
        id: Uuid,
        application: &Application,
    ) -> Result<Option<ChangeRequest>, super::StorageError>;
}
