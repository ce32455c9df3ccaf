//! Transfer process entity and its state machine rules.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::data_address::DataAddress;
use crate::domain::error::{DomainError, DomainResult};

/// Which side of the transfer this connector plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferType {
    /// We request data from a counterparty
    Consumer,
    /// We serve data to a counterparty
    Provider,
}

impl TransferType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Consumer => "CONSUMER",
            Self::Provider => "PROVIDER",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CONSUMER" => Some(Self::Consumer),
            "PROVIDER" => Some(Self::Provider),
            _ => None,
        }
    }
}

/// Transfer process lifecycle states.
///
/// Each state carries an ordinal code; the state machine only moves along
/// edges listed in [`TransferProcessState::can_transition_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferProcessState {
    Initial,
    Provisioning,
    Provisioned,
    Requesting,
    Requested,
    Starting,
    Started,
    Suspending,
    Suspended,
    Resuming,
    Completing,
    Completed,
    Deprovisioning,
    Deprovisioned,
    Terminating,
    Terminated,
}

impl TransferProcessState {
    pub fn code(&self) -> u32 {
        match self {
            Self::Initial => 100,
            Self::Provisioning => 200,
            Self::Provisioned => 300,
            Self::Requesting => 400,
            Self::Requested => 500,
            Self::Starting => 550,
            Self::Started => 600,
            Self::Suspending => 650,
            Self::Suspended => 700,
            Self::Resuming => 720,
            Self::Completing => 750,
            Self::Completed => 800,
            Self::Deprovisioning => 900,
            Self::Deprovisioned => 1000,
            Self::Terminating => 1050,
            Self::Terminated => 1100,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initial => "INITIAL",
            Self::Provisioning => "PROVISIONING",
            Self::Provisioned => "PROVISIONED",
            Self::Requesting => "REQUESTING",
            Self::Requested => "REQUESTED",
            Self::Starting => "STARTING",
            Self::Started => "STARTED",
            Self::Suspending => "SUSPENDING",
            Self::Suspended => "SUSPENDED",
            Self::Resuming => "RESUMING",
            Self::Completing => "COMPLETING",
            Self::Completed => "COMPLETED",
            Self::Deprovisioning => "DEPROVISIONING",
            Self::Deprovisioned => "DEPROVISIONED",
            Self::Terminating => "TERMINATING",
            Self::Terminated => "TERMINATED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INITIAL" => Some(Self::Initial),
            "PROVISIONING" => Some(Self::Provisioning),
            "PROVISIONED" => Some(Self::Provisioned),
            "REQUESTING" => Some(Self::Requesting),
            "REQUESTED" => Some(Self::Requested),
            "STARTING" => Some(Self::Starting),
            "STARTED" => Some(Self::Started),
            "SUSPENDING" => Some(Self::Suspending),
            "SUSPENDED" => Some(Self::Suspended),
            "RESUMING" => Some(Self::Resuming),
            "COMPLETING" => Some(Self::Completing),
            "COMPLETED" => Some(Self::Completed),
            "DEPROVISIONING" => Some(Self::Deprovisioning),
            "DEPROVISIONED" => Some(Self::Deprovisioned),
            "TERMINATING" => Some(Self::Terminating),
            "TERMINATED" => Some(Self::Terminated),
            _ => None,
        }
    }

    /// No further transfer activity happens in these states.
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::Terminated | Self::Deprovisioned)
    }

    /// Whether a client-requested termination is still possible.
    pub fn can_be_terminated(&self) -> bool {
        !self.is_finished() && !matches!(self, Self::Terminating | Self::Deprovisioning)
    }

    /// Legal state-machine edges.
    pub fn can_transition_to(&self, next: TransferProcessState) -> bool {
        use TransferProcessState::*;
        if next == Terminating {
            return self.can_be_terminated();
        }
        matches!(
            (self, next),
            (Initial, Provisioning)
                | (Provisioning, Provisioned)
                | (Provisioned, Requesting)
                | (Provisioned, Starting)
                | (Requesting, Requested)
                | (Requested, Starting)
                | (Requested, Started)
                | (Starting, Started)
                | (Started, Suspending)
                | (Started, Completing)
                | (Suspending, Suspended)
                | (Suspended, Resuming)
                | (Resuming, Starting)
                | (Completing, Completed)
                | (Completed, Deprovisioning)
                | (Terminated, Deprovisioning)
                | (Deprovisioning, Deprovisioned)
                | (Terminating, Terminated)
        )
    }
}

impl std::fmt::Display for TransferProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Endpoint notified about transfer-process events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackAddress {
    pub uri: String,
    /// Event-type prefixes to deliver; empty means all events
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default)]
    pub transactional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_key: Option<String>,
}

impl CallbackAddress {
    /// Whether an event of the given type should be delivered to this address.
    pub fn matches(&self, event_type: &str) -> bool {
        self.events.is_empty() || self.events.iter().any(|e| event_type.starts_with(e.as_str()))
    }
}

/// Input for initiating a transfer process.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub id: Option<String>,
    pub transfer_type: TransferType,
    pub protocol: String,
    pub counter_party_address: String,
    pub counter_party_id: Option<String>,
    pub asset_id: String,
    pub contract_id: String,
    pub source_address: Option<DataAddress>,
    pub data_destination: DataAddress,
    pub callback_addresses: Vec<CallbackAddress>,
    pub properties: HashMap<String, String>,
}

/// A transfer process as tracked by the control plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferProcess {
    pub id: String,
    pub transfer_type: TransferType,
    pub protocol: String,
    pub counter_party_address: String,
    pub counter_party_id: Option<String>,
    pub asset_id: String,
    pub contract_id: String,
    /// Where the provider reads from; absent on the consumer side
    pub source_address: Option<DataAddress>,
    /// Where the data ends up
    pub data_destination: DataAddress,
    pub state: TransferProcessState,
    pub state_timestamp: DateTime<Utc>,
    /// Number of state changes this process went through
    pub state_count: u32,
    pub error_detail: Option<String>,
    pub callback_addresses: Vec<CallbackAddress>,
    pub properties: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransferProcess {
    pub fn new(request: TransferRequest) -> Self {
        let now = Utc::now();
        Self {
            id: request
                .id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            transfer_type: request.transfer_type,
            protocol: request.protocol,
            counter_party_address: request.counter_party_address,
            counter_party_id: request.counter_party_id,
            asset_id: request.asset_id,
            contract_id: request.contract_id,
            source_address: request.source_address,
            data_destination: request.data_destination,
            state: TransferProcessState::Initial,
            state_timestamp: now,
            state_count: 0,
            error_detail: None,
            callback_addresses: request.callback_addresses,
            properties: request.properties,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `next`, enforcing the transition table. On success the
    /// state timestamp is refreshed and the state count incremented.
    pub fn transition_to(&mut self, next: TransferProcessState) -> DomainResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(DomainError::IllegalTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        self.state = next;
        self.state_timestamp = Utc::now();
        self.state_count += 1;
        self.updated_at = self.state_timestamp;
        Ok(())
    }

    /// Begin termination, recording the reason as error detail.
    pub fn terminate(&mut self, reason: impl Into<String>) -> DomainResult<()> {
        let reason = reason.into();
        if reason.trim().is_empty() {
            return Err(DomainError::Validation(
                "Termination reason must not be empty".to_string(),
            ));
        }
        self.transition_to(TransferProcessState::Terminating)?;
        self.error_detail = Some(reason);
        Ok(())
    }
}
