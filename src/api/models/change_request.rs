//! Change request model.
//!
//! A change request is a proposed mutation of a product, sale or purchase that waits
//! for review before it is applied to the backing repository.

use super::enums::{ChangeAction, ChangeStatus, EntityType, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Payload for submitting a change.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewChangeRequest {
    pub entity_type: EntityType,
    pub action: ChangeAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub original_data: Option<Value>,
    #[serde(default = "empty_object")]
    #[schema(value_type = Object)]
    pub proposed_data: Value,
    pub requested_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl NewChangeRequest {
    pub fn create(entity_type: EntityType, proposed_data: Value, requested_by: &str) -> Self {
        Self {
            entity_type,
            action: ChangeAction::Create,
            entity_id: None,
            original_data: None,
            proposed_data,
            requested_by: requested_by.to_string(),
            reason: None,
        }
    }

    pub fn update(
        entity_type: EntityType,
        entity_id: &str,
        proposed_data: Value,
        requested_by: &str,
    ) -> Self {
        Self {
            entity_type,
            action: ChangeAction::Update,
            entity_id: Some(entity_id.to_string()),
            original_data: None,
            proposed_data,
            requested_by: requested_by.to_string(),
            reason: None,
        }
    }

    pub fn delete(entity_type: EntityType, entity_id: &str, requested_by: &str) -> Self {
        Self {
            entity_type,
            action: ChangeAction::Delete,
            entity_id: Some(entity_id.to_string()),
            original_data: None,
            proposed_data: empty_object(),
            requested_by: requested_by.to_string(),
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_original(mut self, original_data: Value) -> Self {
        self.original_data = Some(original_data);
        self
    }
}

/// Result of replaying an approved change against its repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Application {
    Applied {
        applied_at: DateTime<Utc>,
        /// Record returned by the repository (absent for deletes)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        #[schema(value_type = Option<Object>)]
        result: Option<Value>,
    },
    Failed {
        failed_at: DateTime<Utc>,
        error: String,
        attempts: u32,
    },
}

impl Application {
    pub fn is_applied(&self) -> bool {
        matches!(self, Application::Applied { .. })
    }

    /// Number of failed dispatches recorded so far.
    pub fn failed_attempts(&self) -> u32 {
        match self {
            Application::Applied { .. } => 0,
            Application::Failed { attempts, .. } => *attempts,
        }
    }
}

/// A reviewer's decision, applied to a pending request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub status: ChangeStatus,
    pub reviewed_by: String,
    pub reviewed_at: DateTime<Utc>,
    pub notes: Option<String>,
}

impl Review {
    pub fn approve(reviewed_by: &str, notes: Option<String>) -> Self {
        Self {
            status: ChangeStatus::Approved,
            reviewed_by: reviewed_by.to_string(),
            reviewed_at: Utc::now(),
            notes,
        }
    }

    pub fn reject(reviewed_by: &str, notes: Option<String>) -> Self {
        Self {
            status: ChangeStatus::Rejected,
            reviewed_by: reviewed_by.to_string(),
            reviewed_at: Utc::now(),
            notes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChangeRequest {
    pub id: Uuid,
    pub entity_type: EntityType,
    pub action: ChangeAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub original_data: Option<Value>,
    #[schema(value_type = Object)]
    pub proposed_data: Value,
    pub requested_by: String,
    pub requested_at: DateTime<Utc>,
    pub status: ChangeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application: Option<Application>,
}

impl ChangeRequest {
    /// Build a pending request from a submission, assigning a fresh id.
    pub fn from_submission(change: NewChangeRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity_type: change.entity_type,
            action: change.action,
            entity_id: change.entity_id,
            original_data: change.original_data,
            proposed_data: change.proposed_data,
            requested_by: change.requested_by,
            requested_at: Utc::now(),
            status: ChangeStatus::Pending,
            reviewed_by: None,
            reviewed_at: None,
            review_notes: None,
            reason: change.reason,
            application: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ChangeStatus::Pending
    }

    /// Approved but not (yet) successfully applied.
    pub fn needs_application(&self) -> bool {
        self.status == ChangeStatus::Approved
            && !self.application.as_ref().is_some_and(Application::is_applied)
    }

    /// Record a review decision. Callers must only do this on pending requests.
    pub fn apply_review(&mut self, review: &Review) {
        self.status = review.status;
        self.reviewed_by = Some(review.reviewed_by.clone());
        self.reviewed_at = Some(review.reviewed_at);
        self.review_notes = review.notes.clone();
    }
}

/// Identity of whoever is proposing a change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Actor {
    pub identity: String,
    #[serde(default)]
    pub role: Role,
}

impl Actor {
    pub fn admin(identity: &str) -> Self {
        Self {
            identity: identity.to_string(),
            role: Role::Admin,
        }
    }

    pub fn staff(identity: &str) -> Self {
        Self {
            identity: identity.to_string(),
            role: Role::Staff,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
