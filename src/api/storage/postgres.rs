//! PostgreSQL change request store.
//!
//! Uses sqlx for database operations and implements the ChangeRequestStore trait.

use super::{ChangeRequestStore, ReviewTransition, StorageError};
use crate::models::{Application, ChangeRequest, ChangeStatus, Review};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

const COLUMNS: &str = "id, entity_type, action, entity_id, original_data, proposed_data, \
     requested_by, requested_at, status, reviewed_by, reviewed_at, review_notes, reason, application";

/// Raw `change_requests` row; enums are stored as text.
#[derive(sqlx::FromRow)]
struct ChangeRequestRow {
    id: Uuid,
    entity_type: String,
    action: String,
    entity_id: Option<String>,
    original_data: Option<Value>,
    proposed_data: Value,
    requested_by: String,
    requested_at: DateTime<Utc>,
    status: String,
    reviewed_by: Option<String>,
    reviewed_at: Option<DateTime<Utc>>,
    review_notes: Option<String>,
    reason: Option<String>,
    application: Option<Value>,
}

impl TryFrom<ChangeRequestRow> for ChangeRequest {
    type Error = StorageError;

    fn try_from(r: ChangeRequestRow) -> Result<Self, Self::Error> {
        let application = r
            .application
            .map(serde_json::from_value::<Application>)
            .transpose()?;

        Ok(ChangeRequest {
            id: r.id,
            entity_type: r.entity_type.parse().map_err(StorageError::Serialization)?,
            action: r.action.parse().map_err(StorageError::Serialization)?,
            entity_id: r.entity_id,
            original_data: r.original_data,
            proposed_data: r.proposed_data,
            requested_by: r.requested_by,
            requested_at: r.requested_at,
            status: r.status.parse().map_err(StorageError::Serialization)?,
            reviewed_by: r.reviewed_by,
            reviewed_at: r.reviewed_at,
            review_notes: r.review_notes,
            reason: r.reason,
            application,
        })
    }
}

/// PostgreSQL change request store.
pub struct PostgresChangeRequestStore {
    pool: PgPool,
}

impl PostgresChangeRequestStore {
    /// Create a new PostgreSQL change request store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run the embedded migrations.
    pub async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::ConnectionError(format!("Migration failed: {}", e)))
    }
}

#[async_trait]
impl ChangeRequestStore for PostgresChangeRequestStore {
    async fn insert(&self, request: ChangeRequest) -> Result<ChangeRequest, StorageError> {
        let application = request
            .application
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO change_requests (id, entity_type, action, entity_id, original_data, proposed_data,
                requested_by, requested_at, status, reviewed_by, reviewed_at, review_notes, reason, application)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(request.id)
        .bind(request.entity_type.as_str())
        .bind(request.action.as_str())
        .bind(&request.entity_id)
        .bind(&request.original_data)
        .bind(&request.proposed_data)
        .bind(&request.requested_by)
        .bind(request.requested_at)
        .bind(request.status.as_str())
        .bind(&request.reviewed_by)
        .bind(request.reviewed_at)
        .bind(&request.review_notes)
        .bind(&request.reason)
        .bind(application)
        .execute(&self.pool)
        .await?;

        Ok(request)
    }

    async fn get(&self, id: Uuid) -> Result<Option<ChangeRequest>, StorageError> {
        let row = sqlx::query_as::<_, ChangeRequestRow>(&format!(
            "SELECT {COLUMNS} FROM change_requests WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ChangeRequest::try_from).transpose()
    }

    async fn list(&self) -> Result<Vec<ChangeRequest>, StorageError> {
        let rows = sqlx::query_as::<_, ChangeRequestRow>(&format!(
            "SELECT {COLUMNS} FROM change_requests ORDER BY seq"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ChangeRequest::try_from).collect()
    }

    async fn review(&self, id: Uuid, review: &Review) -> Result<ReviewTransition, StorageError> {
        let updated = sqlx::query_as::<_, ChangeRequestRow>(&format!(
            r#"
            UPDATE change_requests
            SET status = $2, reviewed_by = $3, reviewed_at = $4, review_notes = $5
            WHERE id = $1 AND status = '{}'
            RETURNING {COLUMNS}
            "#,
            ChangeStatus::Pending.as_str()
        ))
        .bind(id)
        .bind(review.status.as_str())
        .bind(&review.reviewed_by)
        .bind(review.reviewed_at)
        .bind(&review.notes)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = updated {
            return Ok(ReviewTransition::Reviewed(row.try_into()?));
        }

        Ok(match self.get(id).await? {
            Some(existing) => ReviewTransition::AlreadyReviewed(existing),
            None => ReviewTransition::NotFound,
        })
    }

    async fn record_application(
        &self,
        id: Uuid,
        application: &Application,
    ) -> Result<Option<ChangeRequest>, StorageError> {
        let row = sqlx::query_as::<_, ChangeRequestRow>(&format!(
            "UPDATE change_requests SET application = $2 WHERE id = $1 RETURNING {COLUMNS}"
        ))
        .bind(id)
        .bind(serde_json::to_value(application)?)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ChangeRequest::try_from).transpose()
    }
}
