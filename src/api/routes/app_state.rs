//! Application state management.
//!
//! Defines the AppState struct holding the approval workflow and the backends it was
//! wired with.

use crate::config::ApiConfig;
use crate::models::EntityType;
use crate::services::{ApprovalWorkflow, Repositories};
use crate::storage::{
    ChangeRequestStore, EntityRepository, InMemoryChangeRequestStore, PostgresChangeRequestStore,
    RestRepository, StorageError,
};
use std::sync::Arc;
use tracing::info;

/// Application state shared across all route handlers.
#[derive(Clone)]
pub struct AppState {
    /// Approval workflow over the configured store and repositories
    pub workflow: Arc<ApprovalWorkflow>,
    /// Whether change requests are persisted in PostgreSQL
    pub durable: bool,
}

impl AppState {
    /// Wrap an already wired workflow; change requests are treated as non-durable.
    pub fn with_workflow(workflow: Arc<ApprovalWorkflow>) -> Self {
        Self {
            workflow,
            durable: false,
        }
    }

    /// Initialize backends from configuration.
    ///
    /// Connects to PostgreSQL if a database URL is set, otherwise keeps change requests
    /// in memory. Repositories talk to the remote document store if one is configured.
    pub async fn from_config(config: &ApiConfig) -> Result<Self, StorageError> {
        let repositories = match &config.document_store_url {
            Some(base_url) => {
                info!("Applying approved changes to document store at {}", base_url);
                let client = RestRepository::client_with_timeout(config.document_store_timeout)?;
                Repositories::from_fn(|entity_type: EntityType| -> Arc<dyn EntityRepository> {
                    Arc::new(RestRepository::new(client.clone(), base_url, entity_type))
                })
            }
            None => {
                info!("No DOCUMENT_STORE_URL set, using in-memory repositories");
                Repositories::in_memory()
            }
        };

        let (store, durable): (Arc<dyn ChangeRequestStore>, bool) = match &config.database_url {
            Some(database_url) => {
                let pool = sqlx::PgPool::connect(database_url).await.map_err(|e| {
                    StorageError::ConnectionError(format!("Failed to connect to database: {}", e))
                })?;
                let store = PostgresChangeRequestStore::new(pool);
                store.migrate().await?;
                info!("Change requests stored in PostgreSQL");
                (Arc::new(store), true)
            }
            None => {
                info!("No DATABASE_URL set, change requests are kept in memory only");
                (Arc::new(InMemoryChangeRequestStore::new()), false)
            }
        };

        Ok(Self {
            workflow: Arc::new(ApprovalWorkflow::new(store, repositories)),
            durable,
        })
    }
}
