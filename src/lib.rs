// API module for the approvals service
pub mod api;

// Re-export api modules at crate root so code can use crate::services, crate::models
pub use api::config;
pub use api::middleware;
pub use api::models;
pub use api::routes;
pub use api::services;
pub use api::storage;
