// Models module - contains ChangeRequest, its lifecycle enums and the actor proposing changes

pub mod change_request;
#[path = "enums.rs"]
pub mod enums;

pub use change_request::{Actor, Application, ChangeRequest, NewChangeRequest, Review};
pub use enums::{ChangeAction, ChangeStatus, EntityType, Role};
