//! HTTP API: management endpoints, public data endpoint, health, metrics.

pub mod common;
pub mod middleware;
pub mod modules;
pub mod router;

pub use router::create_api_router;
