//! Monitoring handlers — live data flows and process statistics.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{extract::State, Json};

use super::dto::ConnectorStatsDto;
use crate::dataplane::registry::FlowSnapshot;
use crate::dataplane::FlowRegistry;
use crate::domain::SharedTransferProcessRepository;
use crate::interfaces::http::common::{map_domain_error, ApiError};

/// Monitoring handler state
#[derive(Clone)]
pub struct MonitoringState {
    pub flow_registry: Arc<FlowRegistry>,
    pub repository: SharedTransferProcessRepository,
}

#[utoipa::path(
    get,
    path = "/api/v1/management/monitoring/dataflows",
    tag = "Monitoring",
    responses(
        (status = 200, description = "Currently executing data flows", body = [FlowSnapshot])
    ),
    security(("api_key" = []))
)]
pub async fn list_data_flows(State(state): State<MonitoringState>) -> Json<Vec<FlowSnapshot>> {
    Json(state.flow_registry.snapshot())
}

#[utoipa::path(
    get,
    path = "/api/v1/management/monitoring/stats",
    tag = "Monitoring",
    responses(
        (status = 200, description = "Connector statistics", body = ConnectorStatsDto)
    ),
    security(("api_key" = []))
)]
pub async fn get_stats(
    State(state): State<MonitoringState>,
) -> Result<Json<ConnectorStatsDto>, ApiError> {
    let processes = state
        .repository
        .find_all()
        .await
        .map_err(map_domain_error)?;

    let mut by_state: BTreeMap<String, u64> = BTreeMap::new();
    for process in &processes {
        *by_state.entry(process.state.as_str().to_string()).or_default() += 1;
    }

    Ok(Json(ConnectorStatsDto {
        total_processes: processes.len() as u64,
        processes_by_state: by_state,
        active_data_flows: state.flow_registry.count() as u32,
    }))
}
