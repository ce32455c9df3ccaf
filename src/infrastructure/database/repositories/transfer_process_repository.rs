//! SeaORM implementation of TransferProcessRepository

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use tracing::debug;

use crate::domain::{
    DomainError, DomainResult, TransferProcess, TransferProcessRepository, TransferProcessState,
};
use crate::infrastructure::database::entities::transfer_process;

pub struct SeaOrmTransferProcessRepository {
    db: DatabaseConnection,
}

impl SeaOrmTransferProcessRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn db_err(e: sea_orm::DbErr) -> DomainError {
    DomainError::Storage(e.to_string())
}

fn json_err(e: serde_json::Error) -> DomainError {
    DomainError::Storage(format!("Corrupt stored process: {}", e))
}

fn to_active_model(p: &TransferProcess) -> DomainResult<transfer_process::ActiveModel> {
    Ok(transfer_process::ActiveModel {
        id: Set(p.id.clone()),
        transfer_type: Set(p.transfer_type.as_str().to_string()),
        protocol: Set(p.protocol.clone()),
        counter_party_address: Set(p.counter_party_address.clone()),
        counter_party_id: Set(p.counter_party_id.clone()),
        asset_id: Set(p.asset_id.clone()),
        contract_id: Set(p.contract_id.clone()),
        source_address: Set(p
            .source_address
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(json_err)?),
        data_destination: Set(serde_json::to_string(&p.data_destination).map_err(json_err)?),
        state: Set(p.state.as_str().to_string()),
        state_code: Set(p.state.code() as i32),
        state_timestamp: Set(p.state_timestamp),
        state_count: Set(p.state_count as i32),
        error_detail: Set(p.error_detail.clone()),
        callback_addresses: Set(serde_json::to_string(&p.callback_addresses).map_err(json_err)?),
        properties: Set(serde_json::to_string(&p.properties).map_err(json_err)?),
        created_at: Set(p.created_at),
        updated_at: Set(p.updated_at),
    })
}

fn model_to_domain(m: transfer_process::Model) -> DomainResult<TransferProcess> {
    use crate::domain::TransferType;

    let state = TransferProcessState::parse(&m.state)
        .ok_or_else(|| DomainError::Storage(format!("Unknown stored state `{}`", m.state)))?;
    let transfer_type = TransferType::parse(&m.transfer_type).ok_or_else(|| {
        DomainError::Storage(format!("Unknown stored transfer type `{}`", m.transfer_type))
    })?;

    Ok(TransferProcess {
        id: m.id,
        transfer_type,
        protocol: m.protocol,
        counter_party_address: m.counter_party_address,
        counter_party_id: m.counter_party_id,
        asset_id: m.asset_id,
        contract_id: m.contract_id,
        source_address: m
            .source_address
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(json_err)?,
        data_destination: serde_json::from_str(&m.data_destination).map_err(json_err)?,
        state,
        state_timestamp: m.state_timestamp,
        state_count: m.state_count as u32,
        error_detail: m.error_detail,
        callback_addresses: serde_json::from_str(&m.callback_addresses).map_err(json_err)?,
        properties: serde_json::from_str(&m.properties).map_err(json_err)?,
        created_at: m.created_at,
        updated_at: m.updated_at,
    })
}

// ── TransferProcessRepository impl ──────────────────────────────

#[async_trait]
impl TransferProcessRepository for SeaOrmTransferProcessRepository {
    async fn save(&self, process: TransferProcess) -> DomainResult<()> {
        debug!(process_id = %process.id, "Saving transfer process");
        let model = to_active_model(&process)?;
        model.insert(&self.db).await.map_err(db_err)?;
        Ok(())
    }

    async fn update(&self, process: TransferProcess) -> DomainResult<()> {
        debug!(process_id = %process.id, state = %process.state, "Updating transfer process");
        let model = to_active_model(&process)?;
        model.update(&self.db).await.map_err(db_err)?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> DomainResult<Option<TransferProcess>> {
        transfer_process::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(model_to_domain)
            .transpose()
    }

    async fn find_by_state(
        &self,
        state: TransferProcessState,
        limit: u64,
    ) -> DomainResult<Vec<TransferProcess>> {
        transfer_process::Entity::find()
            .filter(transfer_process::Column::State.eq(state.as_str()))
            .order_by_asc(transfer_process::Column::StateTimestamp)
            .limit(limit)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(model_to_domain)
            .collect()
    }

    async fn find_all(&self) -> DomainResult<Vec<TransferProcess>> {
        transfer_process::Entity::find()
            .order_by_asc(transfer_process::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(model_to_domain)
            .collect()
    }
}
