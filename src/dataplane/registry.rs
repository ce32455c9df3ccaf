//! Flow registry — tracks data flows currently executing in the data plane.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::domain::DataFlowState;

/// One running (or just-finished) flow.
pub struct ActiveFlow {
    pub flow_id: String,
    pub process_id: String,
    pub state: DataFlowState,
    pub started_at: DateTime<Utc>,
    /// Present while the pipeline task is running; consumed on terminate
    terminate_tx: Option<oneshot::Sender<()>>,
}

/// Snapshot of a flow for monitoring endpoints.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct FlowSnapshot {
    pub flow_id: String,
    pub process_id: String,
    pub state: String,
    pub started_at: DateTime<Utc>,
}

/// Thread-safe registry of active data flows
#[derive(Default)]
pub struct FlowRegistry {
    flows: DashMap<String, ActiveFlow>,
}

impl FlowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new flow; returns the receiver the pipeline task must
    /// select on for termination.
    pub fn register(
        &self,
        flow_id: &str,
        process_id: &str,
    ) -> oneshot::Receiver<()> {
        let (terminate_tx, terminate_rx) = oneshot::channel();
        info!(flow_id, process_id, "Registering data flow");
        self.flows.insert(
            flow_id.to_string(),
            ActiveFlow {
                flow_id: flow_id.to_string(),
                process_id: process_id.to_string(),
                state: DataFlowState::Received,
                started_at: Utc::now(),
                terminate_tx: Some(terminate_tx),
            },
        );
        terminate_rx
    }

    pub fn set_state(&self, flow_id: &str, state: DataFlowState) {
        if let Some(mut flow) = self.flows.get_mut(flow_id) {
            flow.state = state;
        }
    }

    /// Drop a finished flow from the registry.
    pub fn remove(&self, flow_id: &str) {
        if self.flows.remove(flow_id).is_none() {
            warn!(flow_id, "Attempted to remove unknown data flow");
        }
    }

    /// Fire the termination signal for one flow. Returns whether a running
    /// flow was signalled.
    pub fn terminate(&self, flow_id: &str) -> bool {
        match self.flows.get_mut(flow_id) {
            Some(mut flow) => match flow.terminate_tx.take() {
                Some(tx) => tx.send(()).is_ok(),
                None => false,
            },
            None => false,
        }
    }

    /// Terminate every flow belonging to a transfer process. Returns the
    /// number of flows signalled.
    pub fn terminate_by_process(&self, process_id: &str) -> usize {
        let flow_ids: Vec<String> = self
            .flows
            .iter()
            .filter(|f| f.process_id == process_id)
            .map(|f| f.flow_id.clone())
            .collect();
        flow_ids.iter().filter(|id| self.terminate(id)).count()
    }

    pub fn count(&self) -> usize {
        self.flows.len()
    }

    pub fn snapshot(&self) -> Vec<FlowSnapshot> {
        self.flows
            .iter()
            .map(|f| FlowSnapshot {
                flow_id: f.flow_id.clone(),
                process_id: f.process_id.clone(),
                state: f.state.as_str().to_string(),
                started_at: f.started_at,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_remove() {
        let registry = FlowRegistry::new();
        let _rx = registry.register("flow-1", "process-1");
        assert_eq!(registry.count(), 1);

        registry.remove("flow-1");
        assert_eq!(registry.count(), 0);
    }

    #[tokio::test]
    async fn terminate_fires_signal_once() {
        let registry = FlowRegistry::new();
        let rx = registry.register("flow-1", "process-1");

        assert!(registry.terminate("flow-1"));
        rx.await.unwrap();
        // Second call finds no sender left
        assert!(!registry.terminate("flow-1"));
    }

    #[test]
    fn terminate_unknown_flow_is_noop() {
        let registry = FlowRegistry::new();
        assert!(!registry.terminate("missing"));
    }

    #[tokio::test]
    async fn terminate_by_process_hits_all_flows() {
        let registry = FlowRegistry::new();
        let _rx1 = registry.register("flow-1", "process-1");
        let _rx2 = registry.register("flow-2", "process-1");
        let _rx3 = registry.register("flow-3", "process-2");

        assert_eq!(registry.terminate_by_process("process-1"), 2);
        assert_eq!(registry.terminate_by_process("process-2"), 1);
    }

    #[test]
    fn snapshot_reflects_state() {
        let registry = FlowRegistry::new();
        let _rx = registry.register("flow-1", "process-1");
        registry.set_state("flow-1", DataFlowState::Started);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].state, "STARTED");
    }
}
