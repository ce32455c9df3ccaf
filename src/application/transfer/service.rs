//! Transfer process service — the synchronous API surface behind the
//! management endpoints. State changes requested here only *mark* the
//! intent; the state machine performs the side effects asynchronously.

use std::sync::Arc;

use tracing::info;

use crate::application::events::{Event, SharedEventBus, TransferProcessEvent};
use crate::dataplane::TokenService;
use crate::domain::{
    DomainError, DomainResult, SharedTransferProcessRepository, TransferProcess,
    TransferProcessState, TransferRequest, TransferType,
};

pub struct TransferProcessService {
    repository: SharedTransferProcessRepository,
    token_service: Arc<TokenService>,
    event_bus: SharedEventBus,
}

impl TransferProcessService {
    pub fn new(
        repository: SharedTransferProcessRepository,
        token_service: Arc<TokenService>,
        event_bus: SharedEventBus,
    ) -> Self {
        Self {
            repository,
            token_service,
            event_bus,
        }
    }

    /// Create a new transfer process in `INITIAL`. Successfully returning
    /// only means the transfer was initiated; callers poll the state.
    pub async fn initiate(&self, request: TransferRequest) -> DomainResult<TransferProcess> {
        validate_request(&request)?;

        let process = TransferProcess::new(request);
        self.repository.save(process.clone()).await?;

        info!(process_id = %process.id, asset_id = %process.asset_id, "Transfer process initiated");
        metrics::counter!("transfer_processes_initiated_total").increment(1);
        self.event_bus
            .publish(Event::TransferProcessInitiated(TransferProcessEvent {
                process_id: process.id.clone(),
                state: process.state,
                detail: None,
            }));

        Ok(process)
    }

    pub async fn find_by_id(&self, id: &str) -> DomainResult<TransferProcess> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("TransferProcess", id))
    }

    pub async fn get_state(&self, id: &str) -> DomainResult<TransferProcessState> {
        Ok(self.find_by_id(id).await?.state)
    }

    pub async fn list(&self) -> DomainResult<Vec<TransferProcess>> {
        self.repository.find_all().await
    }

    /// Ask for termination. The state machine stops flows and notifies the
    /// counterparty on its next tick.
    pub async fn terminate(&self, id: &str, reason: &str) -> DomainResult<()> {
        let mut process = self.find_by_id(id).await?;
        process.terminate(reason)?;
        self.repository.update(process.clone()).await?;
        self.publish_state_change(&process, Some(reason.to_string()));
        Ok(())
    }

    pub async fn suspend(&self, id: &str, reason: Option<String>) -> DomainResult<()> {
        let mut process = self.find_by_id(id).await?;
        process.transition_to(TransferProcessState::Suspending)?;
        if reason.is_some() {
            process.error_detail = reason.clone();
        }
        self.repository.update(process.clone()).await?;
        self.publish_state_change(&process, reason);
        Ok(())
    }

    pub async fn resume(&self, id: &str) -> DomainResult<()> {
        let mut process = self.find_by_id(id).await?;
        process.transition_to(TransferProcessState::Resuming)?;
        process.error_detail = None;
        self.repository.update(process.clone()).await?;
        self.publish_state_change(&process, None);
        Ok(())
    }

    pub async fn deprovision(&self, id: &str) -> DomainResult<()> {
        let mut process = self.find_by_id(id).await?;
        process.transition_to(TransferProcessState::Deprovisioning)?;
        self.repository.update(process.clone()).await?;
        self.publish_state_change(&process, None);
        Ok(())
    }

    /// Issue a consumer-pull token for a started transfer. Only provider
    /// processes with a source address can serve data.
    pub async fn issue_pull_token(&self, id: &str) -> DomainResult<String> {
        let process = self.find_by_id(id).await?;
        if process.state != TransferProcessState::Started {
            return Err(DomainError::Conflict(format!(
                "Transfer process {} is {}, token requires STARTED",
                id, process.state
            )));
        }
        let source = process.source_address.as_ref().ok_or_else(|| {
            DomainError::Conflict(format!("Transfer process {} has no source address", id))
        })?;
        self.token_service.issue(&process.id, source)
    }

    fn publish_state_change(&self, process: &TransferProcess, detail: Option<String>) {
        self.event_bus
            .publish(Event::TransferProcessStateChanged(TransferProcessEvent {
                process_id: process.id.clone(),
                state: process.state,
                detail,
            }));
    }
}

fn validate_request(request: &TransferRequest) -> DomainResult<()> {
    if request.counter_party_address.trim().is_empty() {
        return Err(DomainError::Validation(
            "counter_party_address must not be empty".to_string(),
        ));
    }
    if request.asset_id.trim().is_empty() {
        return Err(DomainError::Validation("asset_id must not be empty".to_string()));
    }
    if request.contract_id.trim().is_empty() {
        return Err(DomainError::Validation("contract_id must not be empty".to_string()));
    }
    if request.data_destination.address_type.trim().is_empty() {
        return Err(DomainError::Validation(
            "data_destination.type must not be empty".to_string(),
        ));
    }
    if request.transfer_type == TransferType::Provider && request.source_address.is_none() {
        return Err(DomainError::Validation(
            "Provider transfers require a source_address".to_string(),
        ));
    }
    Ok(())
}
