//! Public data endpoint (consumer pull).

pub mod handlers;

pub use handlers::PublicDataState;
