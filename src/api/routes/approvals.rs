//! Approval routes.
//!
//! Submit change requests, review them and inspect the pending queue and review history.

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::app_state::AppState;
use super::error::ApiError;
use crate::models::{Actor, ChangeRequest, NewChangeRequest};
use crate::services::{Proposal, ReapplyOutcome, ReviewOutcome};

/// Create the approvals router
pub fn approvals_router() -> Router<AppState> {
    Router::new()
        .route("/", post(submit_change))
        .route("/propose", post(propose_change))
        .route("/pending", get(list_pending))
        .route("/history", get(list_history))
        .route("/unapplied", get(list_unapplied))
        .route("/{id}", get(get_change))
        .route("/{id}/approve", post(approve_change))
        .route("/{id}/reject", post(reject_change))
        .route("/{id}/reapply", post(reapply_change))
}

/// Request body for approving or rejecting a change
#[derive(Debug, Deserialize, ToSchema)]
pub struct ReviewRequest {
    pub reviewed_by: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Request body for proposing a change on behalf of an actor
#[derive(Debug, Deserialize, ToSchema)]
pub struct ProposeRequest {
    pub actor: Actor,
    pub change: NewChangeRequest,
}

fn review_response(id: Uuid, outcome: ReviewOutcome) -> Result<Json<ChangeRequest>, ApiError> {
    match outcome {
        ReviewOutcome::NotFound => Err(ApiError::not_found(format!(
            "Change request {} not found",
            id
        ))),
        ReviewOutcome::AlreadyReviewed(request) => Err(ApiError::conflict(format!(
            "Change request {} is already {}",
            id, request.status
        ))),
        ReviewOutcome::Approved(request) | ReviewOutcome::Rejected(request) => Ok(Json(request)),
    }
}

fn reviewer(body: &ReviewRequest) -> Result<&str, ApiError> {
    let reviewer = body.reviewed_by.trim();
    if reviewer.is_empty() {
        return Err(ApiError::bad_request("reviewed_by must not be empty"));
    }
    Ok(reviewer)
}

/// POST /approvals - Submit a change for review
#[utoipa::path(
    post,
    path = "/approvals",
    tag = "Approvals",
    request_body = NewChangeRequest,
    responses(
        (status = 201, description = "Change request queued", body = ChangeRequest),
        (status = 400, description = "Malformed change request")
    )
)]
pub async fn submit_change(
    State(state): State<AppState>,
    Json(change): Json<NewChangeRequest>,
) -> Result<(StatusCode, Json<ChangeRequest>), ApiError> {
    let request = state.workflow.submit(change).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// POST /approvals/propose - Apply an admin's change, or queue anyone else's
#[utoipa::path(
    post,
    path = "/approvals/propose",
    tag = "Approvals",
    request_body = ProposeRequest,
    responses(
        (status = 200, description = "Admin change applied", body = Object),
        (status = 201, description = "Change request queued", body = Object),
        (status = 400, description = "Malformed change request")
    )
)]
pub async fn propose_change(
    State(state): State<AppState>,
    Json(body): Json<ProposeRequest>,
) -> Result<(StatusCode, Json<Proposal>), ApiError> {
    let proposal = state.workflow.propose(body.change, &body.actor).await?;
    let status = match proposal {
        Proposal::Applied(_) => StatusCode::OK,
        Proposal::Submitted(_) => StatusCode::CREATED,
    };
    Ok((status, Json(proposal)))
}

/// GET /approvals/pending - Requests awaiting review, oldest first
#[utoipa::path(
    get,
    path = "/approvals/pending",
    tag = "Approvals",
    responses(
        (status = 200, description = "Pending change requests", body = [ChangeRequest])
    )
)]
pub async fn list_pending(
    State(state): State<AppState>,
) -> Result<Json<Vec<ChangeRequest>>, ApiError> {
    Ok(Json(state.workflow.list_pending().await?))
}

/// GET /approvals/history - Reviewed requests, most recent first
#[utoipa::path(
    get,
    path = "/approvals/history",
    tag = "Approvals",
    responses(
        (status = 200, description = "Reviewed change requests", body = [ChangeRequest])
    )
)]
pub async fn list_history(
    State(state): State<AppState>,
) -> Result<Json<Vec<ChangeRequest>>, ApiError> {
    Ok(Json(state.workflow.list_history().await?))
}

/// GET /approvals/unapplied - Approved requests whose change did not land
#[utoipa::path(
    get,
    path = "/approvals/unapplied",
    tag = "Approvals",
    responses(
        (status = 200, description = "Approved but unapplied change requests", body = [ChangeRequest])
    )
)]
pub async fn list_unapplied(
    State(state): State<AppState>,
) -> Result<Json<Vec<ChangeRequest>>, ApiError> {
    Ok(Json(state.workflow.list_unapplied().await?))
}

/// GET /approvals/{id}
#[utoipa::path(
    get,
    path = "/approvals/{id}",
    tag = "Approvals",
    params(
        ("id" = Uuid, Path, description = "Change request UUID")
    ),
    responses(
        (status = 200, description = "Change request", body = ChangeRequest),
        (status = 404, description = "Change request not found")
    )
)]
pub async fn get_change(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ChangeRequest>, ApiError> {
    state
        .workflow
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Change request {} not found", id)))
}

/// POST /approvals/{id}/approve
#[utoipa::path(
    post,
    path = "/approvals/{id}/approve",
    tag = "Approvals",
    params(
        ("id" = Uuid, Path, description = "Change request UUID")
    ),
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Approved; see `application` for the apply result", body = ChangeRequest),
        (status = 404, description = "Change request not found"),
        (status = 409, description = "Change request already reviewed")
    )
)]
pub async fn approve_change(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ReviewRequest>,
) -> Result<Json<ChangeRequest>, ApiError> {
    let reviewer = reviewer(&body)?;
    let outcome = state
        .workflow
        .approve(id, reviewer, body.notes.clone())
        .await?;
    review_response(id, outcome)
}

/// POST /approvals/{id}/reject
#[utoipa::path(
    post,
    path = "/approvals/{id}/reject",
    tag = "Approvals",
    params(
        ("id" = Uuid, Path, description = "Change request UUID")
    ),
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Rejected", body = ChangeRequest),
        (status = 404, description = "Change request not found"),
        (status = 409, description = "Change request already reviewed")
    )
)]
pub async fn reject_change(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ReviewRequest>,
) -> Result<Json<ChangeRequest>, ApiError> {
    let reviewer = reviewer(&body)?;
    let outcome = state
        .workflow
        .reject(id, reviewer, body.notes.clone())
        .await?;
    review_response(id, outcome)
}

/// POST /approvals/{id}/reapply - Retry applying an approved change
#[utoipa::path(
    post,
    path = "/approvals/{id}/reapply",
    tag = "Approvals",
    params(
        ("id" = Uuid, Path, description = "Change request UUID")
    ),
    responses(
        (status = 200, description = "Dispatched again; see `application`", body = ChangeRequest),
        (status = 404, description = "Change request not found"),
        (status = 409, description = "Change request not approved or already applied")
    )
)]
pub async fn reapply_change(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ChangeRequest>, ApiError> {
    match state.workflow.reapply(id).await? {
        ReapplyOutcome::NotFound => Err(ApiError::not_found(format!(
            "Change request {} not found",
            id
        ))),
        ReapplyOutcome::NotApproved(request) => Err(ApiError::conflict(format!(
            "Change request {} is {}, not approved",
            id, request.status
        ))),
        ReapplyOutcome::AlreadyApplied(_) => Err(ApiError::conflict(format!(
            "Change request {} has already been applied",
            id
        ))),
        ReapplyOutcome::Reapplied(request) => Ok(Json(request)),
    }
}
