//! Monitoring DTOs

use std::collections::BTreeMap;

use serde::Serialize;
use utoipa::ToSchema;

/// Connector-wide statistics
#[derive(Debug, Serialize, ToSchema)]
pub struct ConnectorStatsDto {
    /// Transfer process count per state name
    pub processes_by_state: BTreeMap<String, u64>,
    pub total_processes: u64,
    pub active_data_flows: u32,
}
