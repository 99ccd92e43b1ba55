//! API routes module - organizes all route handlers.
//!
//! Change request operations live under /approvals.

pub mod app_state;
pub mod approvals;
pub mod error;
pub mod openapi;

use axum::{Router, response::Json, routing::get};
use serde_json::{Value, json};

pub use app_state::AppState;
pub use error::ApiError;

/// Create the main API router combining all route modules
///
/// State is applied by callers (e.g. `TestServer` or `main`) via `.with_state(app_state)`.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .nest("/approvals", approvals::approvals_router())
        // OpenAPI documentation endpoints
        .merge(openapi::openapi_router())
}

/// GET /health
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
