pub mod handlers;
pub mod middleware;

pub use handlers::MetricsState;
