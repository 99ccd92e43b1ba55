//! Approval workflow service.
//!
//! Non-admin changes to products, sales and purchases are queued as change requests.
//! A reviewer approves or rejects each request exactly once; approval replays the
//! proposed change against the matching repository and records how that went.

use crate::models::{
    Actor, Application, ChangeAction, ChangeRequest, ChangeStatus, EntityType, NewChangeRequest,
    Review,
};
use crate::storage::{
    ChangeRequestStore, EntityRepository, InMemoryRepository, ReviewTransition, StorageError,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::OwnedMutexGuard;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Errors surfaced by the approval workflow.
#[derive(Error, Debug)]
pub enum ApprovalError {
    #[error("Invalid submission: {0}")]
    InvalidSubmission(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Routing table from entity type to the repository that owns it.
#[derive(Clone)]
pub struct Repositories {
    products: Arc<dyn EntityRepository>,
    sales: Arc<dyn EntityRepository>,
    purchases: Arc<dyn EntityRepository>,
}

impl Repositories {
    pub fn new(
        products: Arc<dyn EntityRepository>,
        sales: Arc<dyn EntityRepository>,
        purchases: Arc<dyn EntityRepository>,
    ) -> Self {
        Self {
            products,
            sales,
            purchases,
        }
    }

    /// Build repositories from a factory called once per entity type.
    pub fn from_fn<F>(mut make: F) -> Self
    where
        F: FnMut(EntityType) -> Arc<dyn EntityRepository>,
    {
        Self::new(
            make(EntityType::Product),
            make(EntityType::Sale),
            make(EntityType::Purchase),
        )
    }

    pub fn in_memory() -> Self {
        Self::from_fn(|entity_type| Arc::new(InMemoryRepository::new(entity_type)))
    }

    pub fn for_entity(&self, entity_type: EntityType) -> &Arc<dyn EntityRepository> {
        match entity_type {
            EntityType::Product => &self.products,
            EntityType::Sale => &self.sales,
            EntityType::Purchase => &self.purchases,
        }
    }
}

/// What an approve or reject call did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "request", rename_all = "snake_case")]
pub enum ReviewOutcome {
    /// No request with that id; nothing changed
    NotFound,
    /// The request was already approved or rejected; nothing changed
    AlreadyReviewed(ChangeRequest),
    /// Approved, with the result of applying the change in `application`
    Approved(ChangeRequest),
    Rejected(ChangeRequest),
}

impl ReviewOutcome {
    pub fn request(&self) -> Option<&ChangeRequest> {
        match self {
            ReviewOutcome::NotFound => None,
            ReviewOutcome::AlreadyReviewed(r)
            | ReviewOutcome::Approved(r)
            | ReviewOutcome::Rejected(r) => Some(r),
        }
    }
}

/// What a reapply call did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "request", rename_all = "snake_case")]
pub enum ReapplyOutcome {
    NotFound,
    /// Pending or rejected requests are never applied
    NotApproved(ChangeRequest),
    AlreadyApplied(ChangeRequest),
    /// Dispatched again; `application` holds the new result
    Reapplied(ChangeRequest),
}

/// Result of proposing a change on behalf of an actor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "request", rename_all = "snake_case")]
pub enum Proposal {
    /// Admin change, approved by its author and applied immediately
    Applied(ChangeRequest),
    /// Queued for review
    Submitted(ChangeRequest),
}

/// Check a submission before it is stored.
pub fn validate_submission(change: &NewChangeRequest) -> Result<(), ApprovalError> {
    if change.requested_by.trim().is_empty() {
        return Err(ApprovalError::InvalidSubmission(
            "requested_by must not be empty".to_string(),
        ));
    }
    if !change.proposed_data.is_object() {
        return Err(ApprovalError::InvalidSubmission(
            "proposed_data must be a JSON object".to_string(),
        ));
    }

    let has_entity_id = change
        .entity_id
        .as_deref()
        .is_some_and(|id| !id.trim().is_empty());
    if change.action.targets_existing() {
        if !has_entity_id {
            return Err(ApprovalError::InvalidSubmission(format!(
                "{} of a {} requires entity_id",
                change.action, change.entity_type
            )));
        }
    } else if change.entity_id.is_some() {
        return Err(ApprovalError::InvalidSubmission(format!(
            "{} of a {} must not carry entity_id",
            change.action, change.entity_type
        )));
    }
    Ok(())
}

type RequestLocks = Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>;

/// Holds the per-request lock; the map entry is pruned on drop, including when the
/// owning future is cancelled.
struct RequestGuard<'a> {
    id: Uuid,
    locks: &'a RequestLocks,
    held: Option<OwnedMutexGuard<()>>,
}

impl Drop for RequestGuard<'_> {
    fn drop(&mut self) {
        // Release first so our own handle is not counted below
        self.held.take();
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(&self.id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.id);
        }
    }
}

/// Approval workflow over an injected change request store and repositories.
pub struct ApprovalWorkflow {
    store: Arc<dyn ChangeRequestStore>,
    repositories: Repositories,
    /// Serialises review and reapply per request id
    request_locks: RequestLocks,
}

impl ApprovalWorkflow {
    pub fn new(store: Arc<dyn ChangeRequestStore>, repositories: Repositories) -> Self {
        Self {
            store,
            repositories,
            request_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Queue a change for review.
    pub async fn submit(&self, change: NewChangeRequest) -> Result<ChangeRequest, ApprovalError> {
        validate_submission(&change)?;
        let request = self
            .store
            .insert(ChangeRequest::from_submission(change))
            .await?;

        info!(
            "Change request {} submitted by {}: {} {}",
            request.id, request.requested_by, request.action, request.entity_type
        );
        Ok(request)
    }

    /// Apply an admin's change directly, or queue anyone else's for review.
    pub async fn propose(
        &self,
        mut change: NewChangeRequest,
        actor: &Actor,
    ) -> Result<Proposal, ApprovalError> {
        change.requested_by = actor.identity.clone();
        if !actor.is_admin() {
            return self.submit(change).await.map(Proposal::Submitted);
        }

        validate_submission(&change)?;
        let mut request = ChangeRequest::from_submission(change);
        request.apply_review(&Review::approve(&actor.identity, None));

        let _guard = self.lock_request(request.id).await;
        let request = self.store.insert(request).await?;
        info!(
            "Change request {} applied directly by admin {}",
            request.id, actor.identity
        );
        Ok(Proposal::Applied(self.apply_and_record(request).await))
    }

    /// Approve a pending request and apply its change.
    ///
    /// Repository failures do not undo the approval; they are logged and recorded on
    /// the returned request as [`Application::Failed`].
    pub async fn approve(
        &self,
        id: Uuid,
        reviewer: &str,
        notes: Option<String>,
    ) -> Result<ReviewOutcome, ApprovalError> {
        let _guard = self.lock_request(id).await;
        match self.review(id, Review::approve(reviewer, notes)).await? {
            ReviewOutcome::Approved(request) => Ok(ReviewOutcome::Approved(
                self.apply_and_record(request).await,
            )),
            other => Ok(other),
        }
    }

    /// Reject a pending request. Never touches the repositories.
    pub async fn reject(
        &self,
        id: Uuid,
        reviewer: &str,
        notes: Option<String>,
    ) -> Result<ReviewOutcome, ApprovalError> {
        let _guard = self.lock_request(id).await;
        self.review(id, Review::reject(reviewer, notes)).await
    }

    /// Dispatch an approved request again after its application failed.
    pub async fn reapply(&self, id: Uuid) -> Result<ReapplyOutcome, ApprovalError> {
        let _guard = self.lock_request(id).await;
        let outcome = match self.store.get(id).await? {
            None => ReapplyOutcome::NotFound,
            Some(request) if !request.needs_application() => {
                if request.application.is_some() {
                    ReapplyOutcome::AlreadyApplied(request)
                } else {
                    ReapplyOutcome::NotApproved(request)
                }
            }
            Some(request) => {
                info!("Reapplying change request {}", id);
                ReapplyOutcome::Reapplied(self.apply_and_record(request).await)
            }
        };
        Ok(outcome)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<ChangeRequest>, ApprovalError> {
        Ok(self.store.get(id).await?)
    }

    /// Pending requests in submission order.
    pub async fn list_pending(&self) -> Result<Vec<ChangeRequest>, ApprovalError> {
        let requests = self.store.list().await?;
        Ok(requests.into_iter().filter(|r| r.is_pending()).collect())
    }

    /// Reviewed requests, most recently reviewed first.
    pub async fn list_history(&self) -> Result<Vec<ChangeRequest>, ApprovalError> {
        let mut history: Vec<ChangeRequest> = self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|r| !r.is_pending())
            .collect();

        // Undated entries go last; ties keep submission order
        history.sort_by(|a, b| match (a.reviewed_at, b.reviewed_at) {
            (Some(a), Some(b)) => b.cmp(&a),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        Ok(history)
    }

    /// Approved requests whose change has not been applied successfully.
    pub async fn list_unapplied(&self) -> Result<Vec<ChangeRequest>, ApprovalError> {
        let requests = self.store.list().await?;
        Ok(requests
            .into_iter()
            .filter(ChangeRequest::needs_application)
            .collect())
    }

    async fn review(&self, id: Uuid, review: Review) -> Result<ReviewOutcome, ApprovalError> {
        match self.store.review(id, &review).await? {
            ReviewTransition::NotFound => {
                warn!("Ignoring {} of unknown change request {}", review.status, id);
                Ok(ReviewOutcome::NotFound)
            }
            ReviewTransition::AlreadyReviewed(request) => {
                warn!(
                    "Ignoring {} of change request {}: already {}",
                    review.status, id, request.status
                );
                Ok(ReviewOutcome::AlreadyReviewed(request))
            }
            ReviewTransition::Reviewed(request) => {
                info!(
                    "Change request {} {} by {}",
                    id, request.status, review.reviewed_by
                );
                Ok(match request.status {
                    ChangeStatus::Rejected => ReviewOutcome::Rejected(request),
                    _ => ReviewOutcome::Approved(request),
                })
            }
        }
    }

    /// Route the proposed data to the repository owning the entity.
    async fn dispatch(&self, request: &ChangeRequest) -> Result<Option<Value>, StorageError> {
        let repository = self.repositories.for_entity(request.entity_type);
        let data = request.proposed_data.clone();

        match request.action {
            ChangeAction::Create => repository.add(data).await.map(Some),
            ChangeAction::Update => repository
                .update(target_id(request)?, data)
                .await
                .map(Some),
            ChangeAction::Delete => repository.delete(target_id(request)?).await.map(|_| None),
        }
    }

    async fn apply_and_record(&self, mut request: ChangeRequest) -> ChangeRequest {
        let previous_failures = request
            .application
            .as_ref()
            .map_or(0, Application::failed_attempts);

        let application = match self.dispatch(&request).await {
            Ok(result) => {
                info!(
                    "Applied change request {} ({} {})",
                    request.id, request.action, request.entity_type
                );
                Application::Applied {
                    applied_at: Utc::now(),
                    result,
                }
            }
            Err(e) => {
                error!(
                    "Failed to apply approved change request {} ({} {}): {}",
                    request.id, request.action, request.entity_type, e
                );
                Application::Failed {
                    failed_at: Utc::now(),
                    error: e.to_string(),
                    attempts: previous_failures + 1,
                }
            }
        };

        match self.store.record_application(request.id, &application).await {
            Ok(Some(updated)) => updated,
            Ok(None) => {
                request.application = Some(application);
                request
            }
            Err(e) => {
                error!(
                    "Failed to record application of change request {}: {}",
                    request.id, e
                );
                request.application = Some(application);
                request
            }
        }
    }

    async fn lock_request(&self, id: Uuid) -> RequestGuard<'_> {
        let lock = {
            let mut locks = self
                .request_locks
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            locks.entry(id).or_default().clone()
        };
        // Declared before `acquire` so a cancelled wait drops the pending lock first
        let mut guard = RequestGuard {
            id,
            locks: &self.request_locks,
            held: None,
        };
        let acquire = lock.lock_owned();
        guard.held = Some(acquire.await);
        guard
    }
}

fn target_id(request: &ChangeRequest) -> Result<&str, StorageError> {
    request.entity_id.as_deref().ok_or_else(|| {
        StorageError::Other(format!(
            "Change request {} has no entity_id to {}",
            request.id, request.action
        ))
    })
}
