//! Callback dispatcher — delivers bus events to the callback addresses
//! registered on the owning transfer process.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use super::{EventMessage, SharedEventBus};
use crate::domain::{CallbackAddress, TransferProcessRepository};
use crate::shared::retry::{retry_with_backoff, RetryConfig};
use crate::shared::shutdown::ShutdownSignal;

pub struct CallbackDispatcher {
    client: reqwest::Client,
    repository: Arc<dyn TransferProcessRepository>,
    event_bus: SharedEventBus,
}

impl CallbackDispatcher {
    pub fn new(
        client: reqwest::Client,
        repository: Arc<dyn TransferProcessRepository>,
        event_bus: SharedEventBus,
    ) -> Self {
        Self {
            client,
            repository,
            event_bus,
        }
    }

    /// Spawn the delivery loop; runs until shutdown.
    pub fn start(self: Arc<Self>, shutdown: ShutdownSignal) {
        let mut subscriber = self.event_bus.subscribe();
        tokio::spawn(async move {
            info!("Callback dispatcher started");
            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    message = subscriber.recv() => match message {
                        Some(message) => self.deliver(&message).await,
                        None => break,
                    },
                }
            }
            info!("Callback dispatcher stopped");
        });
    }

    async fn deliver(&self, message: &EventMessage) {
        let process_id = message.event.process_id();
        let callbacks = match self.repository.find_by_id(process_id).await {
            Ok(Some(process)) => process.callback_addresses,
            Ok(None) => return,
            Err(e) => {
                warn!(process_id, error = %e, "Failed to load process for callback delivery");
                return;
            }
        };

        let event_type = message.event.event_type();
        for callback in callbacks.iter().filter(|c| c.matches(event_type)) {
            if let Err(e) = self.post(callback, message).await {
                warn!(uri = %callback.uri, event_type, error = %e, "Callback delivery failed");
            } else {
                debug!(uri = %callback.uri, event_type, "Callback delivered");
            }
        }
    }

    async fn post(&self, callback: &CallbackAddress, message: &EventMessage) -> Result<(), String> {
        let body = json!({
            "id": message.id,
            "at": message.at,
            "type": message.event.event_type(),
            "payload": message.event,
        });
        retry_with_backoff(
            RetryConfig::quick(),
            || async {
                let mut request = self.client.post(&callback.uri).json(&body);
                if let Some(auth_key) = &callback.auth_key {
                    request = request.header("authorization", auth_key);
                }
                let response = request.send().await.map_err(|e| e.to_string())?;
                if response.status().is_success() {
                    Ok(())
                } else {
                    Err(format!("callback returned {}", response.status()))
                }
            },
            |_| true,
            "callback_delivery",
        )
        .await
    }
}
