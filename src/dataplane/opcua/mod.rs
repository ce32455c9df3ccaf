//! OPC UA source adapter.
//!
//! Reads node values from an OPC UA server and feeds them into the
//! pipeline as JSON-encoded parts. Source addresses use type `OpcUa`
//! (the legacy spelling `OPC_UA` is accepted).

pub mod settings;
pub mod source;

pub use settings::{OpcUaClientSettings, OpcUaIdentity};
pub use source::OpcUaDataSourceFactory;

/// Address property holding one or more node ids, comma-separated
/// (e.g. `ns=2;s=temperature,ns=2;s=pressure`).
pub const NODE_ID: &str = "nodeId";
