//! In-memory transfer process store.
//!
//! Default store for tests and ephemeral deployments (`database.url =
//! "memory"`); production setups use the SeaORM store.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::domain::{
    DomainError, DomainResult, TransferProcess, TransferProcessRepository, TransferProcessState,
};

#[derive(Default)]
pub struct InMemoryTransferProcessRepository {
    processes: DashMap<String, TransferProcess>,
}

impl InMemoryTransferProcessRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransferProcessRepository for InMemoryTransferProcessRepository {
    async fn save(&self, process: TransferProcess) -> DomainResult<()> {
        if self.processes.contains_key(&process.id) {
            return Err(DomainError::Conflict(format!(
                "Transfer process {} already exists",
                process.id
            )));
        }
        self.processes.insert(process.id.clone(), process);
        Ok(())
    }

    async fn update(&self, process: TransferProcess) -> DomainResult<()> {
        if !self.processes.contains_key(&process.id) {
            return Err(DomainError::not_found("TransferProcess", process.id));
        }
        self.processes.insert(process.id.clone(), process);
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> DomainResult<Option<TransferProcess>> {
        Ok(self.processes.get(id).map(|p| p.clone()))
    }

    async fn find_by_state(
        &self,
        state: TransferProcessState,
        limit: u64,
    ) -> DomainResult<Vec<TransferProcess>> {
        let mut matching: Vec<TransferProcess> = self
            .processes
            .iter()
            .filter(|p| p.state == state)
            .map(|p| p.clone())
            .collect();
        matching.sort_by_key(|p| p.state_timestamp);
        matching.truncate(limit as usize);
        Ok(matching)
    }

    async fn find_all(&self) -> DomainResult<Vec<TransferProcess>> {
        let mut all: Vec<TransferProcess> =
            self.processes.iter().map(|p| p.clone()).collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(all)
    }
}
