//! Remote document store repository.
//!
//! Talks to a generic JSON REST store where each entity type lives in its own
//! collection: `POST {base}/{collection}`, `PUT {base}/{collection}/{id}` and
//! `DELETE {base}/{collection}/{id}`.

use super::{EntityRepository, StorageError};
use crate::models::EntityType;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Repository backed by a remote document store.
#[derive(Clone)]
pub struct RestRepository {
    http_client: Client,
    base_url: String,
    entity_type: EntityType,
}

impl RestRepository {
    /// Create a repository sharing an existing HTTP client.
    pub fn new(http_client: Client, base_url: &str, entity_type: EntityType) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            entity_type,
        }
    }

    /// Build an HTTP client suitable for the document store.
    pub fn client_with_timeout(timeout: Duration) -> Result<Client, StorageError> {
        Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::ConnectionError(e.to_string()))
    }

    fn collection_url(&self) -> String {
        format!("{}/{}", self.base_url, self.entity_type.collection())
    }

    /// URL of a single record, with `id` encoded as exactly one path segment.
    fn record_url(&self, id: &str) -> Result<String, StorageError> {
        // Dot segments survive percent-encoding and would be resolved away
        if id.is_empty() || id == "." || id == ".." {
            return Err(StorageError::Other(format!(
                "Invalid {} id: {:?}",
                self.entity_type, id
            )));
        }
        Ok(format!(
            "{}/{}",
            self.collection_url(),
            urlencoding::encode(id)
        ))
    }

    async fn check(&self, response: Response, id: Option<&str>) -> Result<Response, StorageError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            if let Some(id) = id {
                return Err(StorageError::not_found(self.entity_type.as_str(), id));
            }
        }
        let body = response.text().await.unwrap_or_default();
        Err(StorageError::Remote {
            status: status.as_u16(),
            body,
        })
    }

    async fn read_record(response: Response) -> Result<Value, StorageError> {
        response
            .json::<Value>()
            .await
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }
}

fn transport_error(e: reqwest::Error) -> StorageError {
    StorageError::ConnectionError(e.to_string())
}

#[async_trait]
impl EntityRepository for RestRepository {
    async fn add(&self, data: Value) -> Result<Value, StorageError> {
        let url = self.collection_url();
        debug!("POST {}", url);
        let response = self
            .http_client
            .post(&url)
            .json(&data)
            .send()
            .await
            .map_err(transport_error)?;
        let response = self.check(response, None).await?;
        Self::read_record(response).await
    }

    async fn update(&self, id: &str, data: Value) -> Result<Value, StorageError> {
        let url = self.record_url(id)?;
        debug!("PUT {}", url);
        let response = self
            .http_client
            .put(&url)
            .json(&data)
            .send()
            .await
            .map_err(transport_error)?;
        let response = self.check(response, Some(id)).await?;
        Self::read_record(response).await
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        let url = self.record_url(id)?;
        debug!("DELETE {}", url);
        let response = self
            .http_client
            .delete(&url)
            .send()
            .await
            .map_err(transport_error)?;
        self.check(response, Some(id)).await?;
        Ok(())
    }
}
