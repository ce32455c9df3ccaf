//! Event types published on the internal bus and delivered to callbacks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::TransferProcessState;

/// Payload for transfer-process lifecycle events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferProcessEvent {
    pub process_id: String,
    pub state: TransferProcessState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Payload for data-flow events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataFlowEvent {
    pub flow_id: String,
    pub process_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    /// A transfer process was created via the management API
    TransferProcessInitiated(TransferProcessEvent),
    /// A transfer process moved to a new state
    TransferProcessStateChanged(TransferProcessEvent),
    /// A transfer process reached a terminal state
    TransferProcessTerminated(TransferProcessEvent),
    TransferProcessCompleted(TransferProcessEvent),
    /// Data plane started executing a flow
    DataFlowStarted(DataFlowEvent),
    DataFlowCompleted(DataFlowEvent),
    DataFlowFailed(DataFlowEvent),
}

impl Event {
    /// Dotted event-type name, used for callback filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::TransferProcessInitiated(_) => "transfer.process.initiated",
            Event::TransferProcessStateChanged(_) => "transfer.process.state_changed",
            Event::TransferProcessTerminated(_) => "transfer.process.terminated",
            Event::TransferProcessCompleted(_) => "transfer.process.completed",
            Event::DataFlowStarted(_) => "data.flow.started",
            Event::DataFlowCompleted(_) => "data.flow.completed",
            Event::DataFlowFailed(_) => "data.flow.failed",
        }
    }

    /// The transfer process this event belongs to
    pub fn process_id(&self) -> &str {
        match self {
            Event::TransferProcessInitiated(e)
            | Event::TransferProcessStateChanged(e)
            | Event::TransferProcessTerminated(e)
            | Event::TransferProcessCompleted(e) => &e.process_id,
            Event::DataFlowStarted(e)
            | Event::DataFlowCompleted(e)
            | Event::DataFlowFailed(e) => &e.process_id,
        }
    }
}

/// Envelope carrying an event plus delivery metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    pub id: String,
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: Event,
}

impl EventMessage {
    pub fn new(event: Event) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            at: Utc::now(),
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_names_are_dotted() {
        let event = Event::DataFlowCompleted(DataFlowEvent {
            flow_id: "f".to_string(),
            process_id: "p".to_string(),
            detail: None,
        });
        assert_eq!(event.event_type(), "data.flow.completed");
        assert_eq!(event.process_id(), "p");
    }

    #[test]
    fn message_serializes_with_flattened_event() {
        let message = EventMessage::new(Event::TransferProcessInitiated(TransferProcessEvent {
            process_id: "p1".to_string(),
            state: TransferProcessState::Initial,
            detail: None,
        }));
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "TransferProcessInitiated");
        assert_eq!(json["data"]["process_id"], "p1");
        assert!(json["id"].is_string());
    }
}
