//! # Trellis Dataspace Connector
//!
//! A connector for sovereign data exchange: a control plane that manages
//! transfer processes and a data plane that moves the bytes, with an OPC UA
//! source adapter for industrial endpoints.
//!
//! ## Architecture
//!
//! The project follows Clean Architecture principles:
//!
//! - **domain**: Core entities (transfer process, data address) and traits
//! - **application**: Transfer service, state machine, dispatch, events
//! - **dataplane**: Pipeline SPI, adapters (OPC UA source, HTTP sink), flow
//!   manager and access tokens
//! - **infrastructure**: Database persistence, in-memory storage, crypto
//! - **interfaces**: REST management API with Swagger documentation and the
//!   public data endpoint

pub mod application;
pub mod config;
pub mod dataplane;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod shared;

pub use config::{default_config_path, AppConfig};

// Re-export database types for easy access
pub use infrastructure::{init_database, DatabaseConfig};

// Re-export API router
pub use interfaces::http::create_api_router;

// Re-export event bus
pub use application::{create_event_bus, Event, EventBus, SharedEventBus};
