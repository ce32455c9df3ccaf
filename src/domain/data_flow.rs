//! Data-flow types exchanged between the control plane and the data plane.

use serde::{Deserialize, Serialize};

use super::data_address::DataAddress;

/// How the data plane moves the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowType {
    /// Consumer fetches through the public data endpoint
    Pull,
    /// Connector drives a source-to-sink pipeline
    Push,
}

/// Lifecycle of one flow inside the data plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataFlowState {
    Received,
    Started,
    Completed,
    Failed,
    Terminated,
}

impl DataFlowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "RECEIVED",
            Self::Started => "STARTED",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Terminated => "TERMINATED",
        }
    }
}

/// Start message handed to the data plane for one transfer process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataFlowRequest {
    pub flow_id: String,
    pub process_id: String,
    pub source: DataAddress,
    pub destination: DataAddress,
    pub flow_type: FlowType,
}

impl DataFlowRequest {
    pub fn new(
        process_id: impl Into<String>,
        source: DataAddress,
        destination: DataAddress,
        flow_type: FlowType,
    ) -> Self {
        Self {
            flow_id: uuid::Uuid::new_v4().to_string(),
            process_id: process_id.into(),
            source,
            destination,
            flow_type,
        }
    }
}
