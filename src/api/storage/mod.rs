//! Storage module for the API.
//!
//! Provides the entity repositories that approved changes are applied to, and the
//! store that keeps change requests.

pub mod error;
pub mod traits;

// Storage backend implementations
pub mod memory;
pub mod postgres;
pub mod rest;

pub use error::StorageError;
pub use memory::{InMemoryChangeRequestStore, InMemoryRepository};
pub use postgres::PostgresChangeRequestStore;
pub use rest::RestRepository;
pub use traits::{ChangeRequestStore, EntityRepository, ReviewTransition};
