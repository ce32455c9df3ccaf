//! Transfer process entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transfer_processes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// CONSUMER or PROVIDER
    pub transfer_type: String,

    pub protocol: String,
    pub counter_party_address: String,

    #[sea_orm(nullable)]
    pub counter_party_id: Option<String>,

    pub asset_id: String,
    pub contract_id: String,

    /// JSON-encoded DataAddress; absent on the consumer side
    #[sea_orm(nullable)]
    pub source_address: Option<String>,

    /// JSON-encoded DataAddress
    pub data_destination: String,

    /// State name: INITIAL, PROVISIONING, ... TERMINATED
    pub state: String,

    /// Ordinal state code, kept for range queries
    pub state_code: i32,

    pub state_timestamp: DateTimeUtc,
    pub state_count: i32,

    #[sea_orm(nullable)]
    pub error_detail: Option<String>,

    /// JSON-encoded list of CallbackAddress
    pub callback_addresses: String,

    /// JSON-encoded private properties map
    pub properties: String,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
