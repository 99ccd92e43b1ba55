//! In-memory storage backends.
//!
//! Used when no remote document store or database is configured, and by tests.
//! Everything held here is lost when the process exits.

use super::{ChangeRequestStore, EntityRepository, ReviewTransition, StorageError};
use crate::models::{Application, ChangeRequest, EntityType, Review};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory repository for one entity collection.
pub struct InMemoryRepository {
    entity_type: EntityType,
    records: RwLock<HashMap<String, Value>>,
}

impl InMemoryRepository {
    pub fn new(entity_type: EntityType) -> Self {
        Self {
            entity_type,
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Get a record by ID
    pub async fn get(&self, id: &str) -> Option<Value> {
        self.records.read().await.get(id).cloned()
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    fn as_object(&self, data: Value) -> Result<Map<String, Value>, StorageError> {
        match data {
            Value::Object(map) => Ok(map),
            other => Err(StorageError::Serialization(format!(
                "{} data must be a JSON object, got {}",
                self.entity_type, other
            ))),
        }
    }
}

#[async_trait]
impl EntityRepository for InMemoryRepository {
    async fn add(&self, data: Value) -> Result<Value, StorageError> {
        let mut fields = self.as_object(data)?;
        let id = match fields.get("id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => Uuid::new_v4().to_string(),
        };
        fields.insert("id".to_string(), Value::String(id.clone()));

        let mut records = self.records.write().await;
        if records.contains_key(&id) {
            return Err(StorageError::Other(format!(
                "{} with id {} already exists",
                self.entity_type, id
            )));
        }
        let record = Value::Object(fields);
        records.insert(id, record.clone());
        Ok(record)
    }

    async fn update(&self, id: &str, data: Value) -> Result<Value, StorageError> {
        let fields = self.as_object(data)?;
        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .ok_or_else(|| StorageError::not_found(self.entity_type.as_str(), id))?;

        if let Value::Object(existing) = record {
            for (key, value) in fields {
                // The record id is owned by the store
                if key != "id" {
                    existing.insert(key, value);
                }
            }
        }
        Ok(record.clone())
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        self.records
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found(self.entity_type.as_str(), id))
    }
}

/// In-memory change request store.
#[derive(Default)]
pub struct InMemoryChangeRequestStore {
    requests: RwLock<Vec<ChangeRequest>>,
}

impl InMemoryChangeRequestStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChangeRequestStore for InMemoryChangeRequestStore {
    async fn insert(&self, request: ChangeRequest) -> Result<ChangeRequest, StorageError> {
        let mut requests = self.requests.write().await;
        if requests.iter().any(|r| r.id == request.id) {
            return Err(StorageError::Other(format!(
                "Change request {} already exists",
                request.id
            )));
        }
        requests.push(request.clone());
        Ok(request)
    }

    async fn get(&self, id: Uuid) -> Result<Option<ChangeRequest>, StorageError> {
        Ok(self.requests.read().await.iter().find(|r| r.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<ChangeRequest>, StorageError> {
        Ok(self.requests.read().await.clone())
    }

    async fn review(&self, id: Uuid, review: &Review) -> Result<ReviewTransition, StorageError> {
        // Held for the whole check-and-set
        let mut requests = self.requests.write().await;
        let Some(request) = requests.iter_mut().find(|r| r.id == id) else {
            return Ok(ReviewTransition::NotFound);
        };
        if !request.is_pending() {
            return Ok(ReviewTransition::AlreadyReviewed(request.clone()));
        }
        request.apply_review(review);
        Ok(ReviewTransition::Reviewed(request.clone()))
    }

    async fn record_application(
        &self,
        id: Uuid,
        application: &Application,
    ) -> Result<Option<ChangeRequest>, StorageError> {
        let mut requests = self.requests.write().await;
        Ok(requests.iter_mut().find(|r| r.id == id).map(|request| {
            request.application = Some(application.clone());
            request.clone()
        }))
    }
}
