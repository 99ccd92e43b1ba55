//! OpenAPI specification definition.
//!
//! Aggregates all route handlers and schemas for OpenAPI documentation generation.

use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    paths(
        // Approvals
        crate::routes::approvals::submit_change,
        crate::routes::approvals::propose_change,
        crate::routes::approvals::list_pending,
        crate::routes::approvals::list_history,
        crate::routes::approvals::list_unapplied,
        crate::routes::approvals::get_change,
        crate::routes::approvals::approve_change,
        crate::routes::approvals::reject_change,
        crate::routes::approvals::reapply_change,
        // OpenAPI
        crate::routes::openapi::serve_openapi_json,
    ),
    components(schemas(
        crate::models::ChangeRequest,
        crate::models::NewChangeRequest,
        crate::models::Application,
        crate::models::Actor,
        crate::models::EntityType,
        crate::models::ChangeAction,
        crate::models::ChangeStatus,
        crate::models::Role,
        crate::routes::approvals::ReviewRequest,
        crate::routes::approvals::ProposeRequest,
    )),
    modifiers(&VersionAddon),
    tags(
        (name = "Approvals", description = "Change request submission and review"),
        (name = "OpenAPI", description = "OpenAPI specification"),
    ),
    info(
        title = "Business Approvals API",
        description = "Review gate for product, sale and purchase changes",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8081/api/v1", description = "Local development server")
    )
)]
pub struct ApiDoc;

struct VersionAddon;

impl Modify for VersionAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        // Keep the document version in step with Cargo.toml
        openapi.info.version = env!("CARGO_PKG_VERSION").to_string();
    }
}
