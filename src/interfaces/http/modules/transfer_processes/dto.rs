//! Transfer process DTOs

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::domain::{
    CallbackAddress, DataAddress, TransferProcess, TransferRequest, TransferType,
};

/// Data address as carried over the wire
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct DataAddressDto {
    /// Adapter type, e.g. `OpcUa` or `HttpData`
    #[serde(rename = "type")]
    #[validate(length(min = 1))]
    pub address_type: String,
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

impl DataAddressDto {
    pub fn into_domain(self) -> DataAddress {
        DataAddress {
            address_type: self.address_type,
            properties: self.properties,
        }
    }

    pub fn from_domain(address: DataAddress) -> Self {
        Self {
            address_type: address.address_type,
            properties: address.properties,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CallbackAddressDto {
    #[validate(length(min = 1))]
    pub uri: String,
    /// Event-type prefixes to deliver; empty means all
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default)]
    pub transactional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_key: Option<String>,
}

impl CallbackAddressDto {
    fn into_domain(self) -> CallbackAddress {
        CallbackAddress {
            uri: self.uri,
            events: self.events,
            transactional: self.transactional,
            auth_key: self.auth_key,
        }
    }

    fn from_domain(callback: CallbackAddress) -> Self {
        Self {
            uri: callback.uri,
            events: callback.events,
            transactional: callback.transactional,
            auth_key: callback.auth_key,
        }
    }
}

/// Body of the initiate operation
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct TransferRequestDto {
    /// Optional client-chosen process id
    pub id: Option<String>,
    pub transfer_type: TransferType,
    /// Wire protocol towards the counterparty
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[validate(length(min = 1))]
    pub counter_party_address: String,
    pub counter_party_id: Option<String>,
    #[validate(length(min = 1))]
    pub asset_id: String,
    #[validate(length(min = 1))]
    pub contract_id: String,
    #[validate(nested)]
    pub source_address: Option<DataAddressDto>,
    #[validate(nested)]
    pub data_destination: DataAddressDto,
    #[serde(default)]
    #[validate(nested)]
    pub callback_addresses: Vec<CallbackAddressDto>,
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

fn default_protocol() -> String {
    "dataspace-protocol-http".to_string()
}

impl TransferRequestDto {
    pub fn into_domain(self) -> TransferRequest {
        TransferRequest {
            id: self.id,
            transfer_type: self.transfer_type,
            protocol: self.protocol,
            counter_party_address: self.counter_party_address,
            counter_party_id: self.counter_party_id,
            asset_id: self.asset_id,
            contract_id: self.contract_id,
            source_address: self.source_address.map(DataAddressDto::into_domain),
            data_destination: self.data_destination.into_domain(),
            callback_addresses: self
                .callback_addresses
                .into_iter()
                .map(CallbackAddressDto::into_domain)
                .collect(),
            properties: self.properties,
        }
    }
}

/// Returned by the initiate operation: the process id to poll.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IdResponse {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

/// Full transfer process representation
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TransferProcessDto {
    pub id: String,
    pub transfer_type: TransferType,
    pub protocol: String,
    pub counter_party_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counter_party_id: Option<String>,
    pub asset_id: String,
    pub contract_id: String,
    pub data_destination: DataAddressDto,
    pub state: String,
    pub state_timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    pub callback_addresses: Vec<CallbackAddressDto>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransferProcessDto {
    pub fn from_domain(process: TransferProcess) -> Self {
        Self {
            id: process.id,
            transfer_type: process.transfer_type,
            protocol: process.protocol,
            counter_party_address: process.counter_party_address,
            counter_party_id: process.counter_party_id,
            asset_id: process.asset_id,
            contract_id: process.contract_id,
            data_destination: DataAddressDto::from_domain(process.data_destination),
            state: process.state.as_str().to_string(),
            state_timestamp: process.state_timestamp,
            error_detail: process.error_detail,
            callback_addresses: process
                .callback_addresses
                .into_iter()
                .map(CallbackAddressDto::from_domain)
                .collect(),
            created_at: process.created_at,
            updated_at: process.updated_at,
        }
    }
}

/// State polling response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TransferStateDto {
    pub state: String,
}

/// Terminate request; a reason is mandatory.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct TerminateTransferDto {
    #[validate(length(min = 1))]
    pub reason: String,
}

/// Suspend request; the reason is optional.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct SuspendTransferDto {
    pub reason: Option<String>,
}

/// Consumer-pull token response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PullTokenDto {
    pub token: String,
}

/// Transfer process query filters
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct TransferProcessFilter {
    /// Filter by state name, e.g. `STARTED`
    pub state: Option<String>,
    pub asset_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    fn initiate_body() -> serde_json::Value {
        serde_json::json!({
            "transfer_type": "PROVIDER",
            "counter_party_address": "http://consumer:8282",
            "asset_id": "asset-1",
            "contract_id": "contract-1",
            "source_address": {
                "type": "OpcUa",
                "properties": { "nodeId": "ns=2;s=temperature" }
            },
            "data_destination": {
                "type": "HttpData",
                "properties": { "baseUrl": "http://sink:9999" }
            }
        })
    }

    #[test]
    fn deserializes_with_default_protocol() {
        let dto: TransferRequestDto = serde_json::from_value(initiate_body()).unwrap();
        assert!(dto.validate().is_ok());
        assert_eq!(dto.protocol, "dataspace-protocol-http");

        let request = dto.into_domain();
        assert_eq!(request.transfer_type, TransferType::Provider);
        assert_eq!(request.data_destination.address_type, "HttpData");
    }

    #[test]
    fn empty_asset_id_fails_validation() {
        let mut body = initiate_body();
        body["asset_id"] = serde_json::json!("");
        let dto: TransferRequestDto = serde_json::from_value(body).unwrap();
        assert!(dto.validate().is_err());
    }

    #[test]
    fn empty_destination_type_fails_validation() {
        let mut body = initiate_body();
        body["data_destination"]["type"] = serde_json::json!("");
        let dto: TransferRequestDto = serde_json::from_value(body).unwrap();
        assert!(dto.validate().is_err());
    }

    #[test]
    fn terminate_requires_reason() {
        let dto: TerminateTransferDto = serde_json::from_value(serde_json::json!({
            "reason": ""
        }))
        .unwrap();
        assert!(dto.validate().is_err());

        let dto: TerminateTransferDto = serde_json::from_value(serde_json::json!({
            "reason": "policy revoked"
        }))
        .unwrap();
        assert!(dto.validate().is_ok());
    }
}
