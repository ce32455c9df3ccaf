//! Create transfer_processes table

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TransferProcesses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TransferProcesses::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(TransferProcesses::TransferType)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TransferProcesses::Protocol)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TransferProcesses::CounterPartyAddress)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(TransferProcesses::CounterPartyId).string())
                    .col(ColumnDef::new(TransferProcesses::AssetId).string().not_null())
                    .col(
                        ColumnDef::new(TransferProcesses::ContractId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(TransferProcesses::SourceAddress).text())
                    .col(
                        ColumnDef::new(TransferProcesses::DataDestination)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TransferProcesses::State)
                            .string()
                            .not_null()
                            .default("INITIAL"),
                    )
                    .col(
                        ColumnDef::new(TransferProcesses::StateCode)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TransferProcesses::StateTimestamp)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TransferProcesses::StateCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(TransferProcesses::ErrorDetail).text())
                    .col(
                        ColumnDef::new(TransferProcesses::CallbackAddresses)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TransferProcesses::Properties)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TransferProcesses::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TransferProcesses::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // The state machine polls by state, oldest first
        manager
            .create_index(
                Index::create()
                    .name("idx_transfer_processes_state")
                    .table(TransferProcesses::Table)
                    .col(TransferProcesses::State)
                    .col(TransferProcesses::StateTimestamp)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TransferProcesses::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum TransferProcesses {
    Table,
    Id,
    TransferType,
    Protocol,
    CounterPartyAddress,
    CounterPartyId,
    AssetId,
    ContractId,
    SourceAddress,
    DataDestination,
    State,
    StateCode,
    StateTimestamp,
    StateCount,
    ErrorDetail,
    CallbackAddresses,
    Properties,
    CreatedAt,
    UpdatedAt,
}
