//! Transfer process store interface

use std::sync::Arc;

use async_trait::async_trait;

use super::model::{TransferProcess, TransferProcessState};
use crate::domain::DomainResult;

/// Shared, reference-counted store handle
pub type SharedTransferProcessRepository = Arc<dyn TransferProcessRepository>;

#[async_trait]
pub trait TransferProcessRepository: Send + Sync {
    /// Insert a new process; fails with a conflict if the id exists.
    async fn save(&self, process: TransferProcess) -> DomainResult<()>;
    /// Persist the current state of an existing process.
    async fn update(&self, process: TransferProcess) -> DomainResult<()>;
    async fn find_by_id(&self, id: &str) -> DomainResult<Option<TransferProcess>>;
    /// Fetch a bounded batch of processes in the given state, oldest
    /// state-timestamp first. The state machine leans on the ordering to
    /// avoid starving old processes.
    async fn find_by_state(
        &self,
        state: TransferProcessState,
        limit: u64,
    ) -> DomainResult<Vec<TransferProcess>>;
    async fn find_all(&self) -> DomainResult<Vec<TransferProcess>>;
}
