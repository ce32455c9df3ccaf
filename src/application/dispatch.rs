//! Protocol message dispatch to counterparty connectors.
//!
//! Messages travel as JSON over HTTP; the dispatcher decorates each request
//! with a bearer token when one is configured for the dataspace.

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::domain::{DataAddress, DomainError, DomainResult};

pub const DATASPACE_PROTOCOL_HTTP: &str = "dataspace-protocol-http";

/// Protocol messages sent to the counterparty control plane.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "messageType")]
pub enum RemoteMessage {
    TransferRequest {
        process_id: String,
        asset_id: String,
        contract_id: String,
        data_destination: DataAddress,
        #[serde(skip)]
        counter_party_address: String,
    },
    TransferStart {
        process_id: String,
        #[serde(skip)]
        counter_party_address: String,
    },
    TransferCompletion {
        process_id: String,
        #[serde(skip)]
        counter_party_address: String,
    },
    TransferTermination {
        process_id: String,
        reason: Option<String>,
        #[serde(skip)]
        counter_party_address: String,
    },
}

impl RemoteMessage {
    pub fn counter_party_address(&self) -> &str {
        match self {
            RemoteMessage::TransferRequest { counter_party_address, .. }
            | RemoteMessage::TransferStart { counter_party_address, .. }
            | RemoteMessage::TransferCompletion { counter_party_address, .. }
            | RemoteMessage::TransferTermination { counter_party_address, .. } => {
                counter_party_address
            }
        }
    }

    pub fn process_id(&self) -> &str {
        match self {
            RemoteMessage::TransferRequest { process_id, .. }
            | RemoteMessage::TransferStart { process_id, .. }
            | RemoteMessage::TransferCompletion { process_id, .. }
            | RemoteMessage::TransferTermination { process_id, .. } => process_id,
        }
    }

    /// Path under the counterparty base address
    pub fn path(&self) -> String {
        match self {
            RemoteMessage::TransferRequest { .. } => "/transfers/request".to_string(),
            RemoteMessage::TransferStart { process_id, .. } => {
                format!("/transfers/{}/start", process_id)
            }
            RemoteMessage::TransferCompletion { process_id, .. } => {
                format!("/transfers/{}/completion", process_id)
            }
            RemoteMessage::TransferTermination { process_id, .. } => {
                format!("/transfers/{}/termination", process_id)
            }
        }
    }
}

#[async_trait]
pub trait RemoteMessageDispatcher: Send + Sync {
    /// Wire protocol this dispatcher speaks
    fn protocol(&self) -> &str;
    async fn dispatch(&self, message: RemoteMessage) -> DomainResult<()>;
}

pub struct HttpRemoteMessageDispatcher {
    client: reqwest::Client,
    /// Bearer token presented to counterparties, if the dataspace uses one
    auth_token: Option<String>,
}

impl HttpRemoteMessageDispatcher {
    pub fn new(client: reqwest::Client, auth_token: Option<String>) -> Self {
        Self { client, auth_token }
    }
}

#[async_trait]
impl RemoteMessageDispatcher for HttpRemoteMessageDispatcher {
    fn protocol(&self) -> &str {
        DATASPACE_PROTOCOL_HTTP
    }

    async fn dispatch(&self, message: RemoteMessage) -> DomainResult<()> {
        let url = format!(
            "{}{}",
            message.counter_party_address().trim_end_matches('/'),
            message.path()
        );
        debug!(url = %url, process_id = message.process_id(), "Dispatching protocol message");

        let mut request = self.client.post(&url).json(&message);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DomainError::Dispatch(format!("POST {} failed: {}", url, e)))?;
        if !response.status().is_success() {
            return Err(DomainError::Dispatch(format!(
                "Counterparty answered {} for {}",
                response.status(),
                url
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_message() -> RemoteMessage {
        RemoteMessage::TransferRequest {
            process_id: "p1".to_string(),
            asset_id: "asset-1".to_string(),
            contract_id: "contract-1".to_string(),
            data_destination: DataAddress::new("HttpData"),
            counter_party_address: "http://provider:8282/protocol".to_string(),
        }
    }

    #[test]
    fn paths_follow_message_type() {
        assert_eq!(request_message().path(), "/transfers/request");
        let completion = RemoteMessage::TransferCompletion {
            process_id: "p1".to_string(),
            counter_party_address: String::new(),
        };
        assert_eq!(completion.path(), "/transfers/p1/completion");
    }

    #[test]
    fn serialization_tags_message_type_and_hides_address() {
        let json = serde_json::to_value(request_message()).unwrap();
        assert_eq!(json["messageType"], "TransferRequest");
        assert_eq!(json["asset_id"], "asset-1");
        assert!(json.get("counter_party_address").is_none());
    }
}
