pub mod handlers;

pub use handlers::{HealthState, ComponentHealth, HealthResponse};
