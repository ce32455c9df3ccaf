//! Management API: transfer processes.

pub mod dto;
pub mod handlers;

pub use handlers::TransferAppState;
