// Middleware module - contains observability and CORS setup

pub mod cors;
pub mod observability;

pub use cors::create_cors_layer;
pub use observability::{init_tracing, trace_layer};
