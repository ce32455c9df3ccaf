//! Data plane manager — runs one pipeline task per accepted flow and
//! reports terminal outcomes back to the control plane.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::pipeline::{PipelineError, PipelineService, TransferOutcome};
use super::registry::FlowRegistry;
use crate::application::events::{DataFlowEvent, Event, SharedEventBus};
use crate::domain::{DataFlowRequest, DataFlowState, DomainError, DomainResult};

/// Terminal report for one flow, consumed by the transfer state machine.
#[derive(Debug)]
pub struct FlowCompletion {
    pub flow_id: String,
    pub process_id: String,
    pub result: Result<TransferOutcome, String>,
}

pub struct DataPlaneManager {
    pipeline: Arc<PipelineService>,
    registry: Arc<FlowRegistry>,
    event_bus: SharedEventBus,
    completions: mpsc::UnboundedSender<FlowCompletion>,
    max_flows: usize,
}

impl DataPlaneManager {
    /// Returns the manager plus the completion channel the control plane
    /// must drain.
    pub fn new(
        pipeline: Arc<PipelineService>,
        registry: Arc<FlowRegistry>,
        event_bus: SharedEventBus,
        max_flows: usize,
    ) -> (Self, mpsc::UnboundedReceiver<FlowCompletion>) {
        let (completions, completions_rx) = mpsc::unbounded_channel();
        (
            Self {
                pipeline,
                registry,
                event_bus,
                completions,
                max_flows,
            },
            completions_rx,
        )
    }

    /// Validate and launch a flow. Rejects when the concurrency bound is
    /// reached or no adapter can serve one of the addresses.
    pub fn start(&self, request: DataFlowRequest) -> DomainResult<()> {
        if self.registry.count() >= self.max_flows {
            return Err(DomainError::Saturated(format!(
                "{} flows already running",
                self.max_flows
            )));
        }
        self.pipeline
            .validate(&request)
            .map_err(|e| DomainError::Validation(e.to_string()))?;

        let terminate_rx = self.registry.register(&request.flow_id, &request.process_id);
        self.registry
            .set_state(&request.flow_id, DataFlowState::Started);
        metrics::gauge!("data_flows_active").set(self.registry.count() as f64);

        self.event_bus.publish(Event::DataFlowStarted(DataFlowEvent {
            flow_id: request.flow_id.clone(),
            process_id: request.process_id.clone(),
            detail: None,
        }));

        let pipeline = self.pipeline.clone();
        let registry = self.registry.clone();
        let event_bus = self.event_bus.clone();
        let completions = self.completions.clone();

        tokio::spawn(async move {
            let flow_id = request.flow_id.clone();
            let process_id = request.process_id.clone();

            let result = tokio::select! {
                result = pipeline.transfer(&request) => result,
                _ = terminate_rx => Err(PipelineError::Terminated),
            };

            let (state, result) = match result {
                Ok(outcome) => {
                    info!(%flow_id, parts = outcome.parts, bytes = outcome.bytes, "Data flow completed");
                    (DataFlowState::Completed, Ok(outcome))
                }
                Err(PipelineError::Terminated) => {
                    info!(%flow_id, "Data flow terminated");
                    (DataFlowState::Terminated, Err("terminated".to_string()))
                }
                Err(e) => {
                    error!(%flow_id, error = %e, "Data flow failed");
                    (DataFlowState::Failed, Err(e.to_string()))
                }
            };

            registry.set_state(&flow_id, state);
            registry.remove(&flow_id);
            metrics::gauge!("data_flows_active").set(registry.count() as f64);

            let event = match state {
                DataFlowState::Completed => Event::DataFlowCompleted(DataFlowEvent {
                    flow_id: flow_id.clone(),
                    process_id: process_id.clone(),
                    detail: None,
                }),
                _ => Event::DataFlowFailed(DataFlowEvent {
                    flow_id: flow_id.clone(),
                    process_id: process_id.clone(),
                    detail: result.as_ref().err().cloned(),
                }),
            };
            event_bus.publish(event);

            // Terminated flows were stopped by the control plane; reporting
            // them back would race the terminate transition.
            if state != DataFlowState::Terminated {
                if completions
                    .send(FlowCompletion {
                        flow_id,
                        process_id,
                        result,
                    })
                    .is_err()
                {
                    warn!("Flow completion receiver dropped");
                }
            }
        });

        Ok(())
    }

    /// Cancel all flows of a transfer process. Returns the number signalled.
    pub fn terminate_by_process(&self, process_id: &str) -> usize {
        self.registry.terminate_by_process(process_id)
    }

    pub fn registry(&self) -> &Arc<FlowRegistry> {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::events::create_event_bus;
    use crate::dataplane::pipeline::{
        DataSink, DataSinkFactory, DataSource, DataSourceFactory, Part, PartStream,
    };
    use crate::domain::{DataAddress, FlowType};
    use async_trait::async_trait;
    use futures_util::{stream, StreamExt};
    use std::time::Duration;

    struct InstantSource;

    #[async_trait]
    impl DataSource for InstantSource {
        async fn open_parts(&mut self) -> Result<PartStream, PipelineError> {
            Ok(stream::iter(vec![Ok(Part::new("p", "data"))]).boxed())
        }
    }

    struct InstantSourceFactory;

    impl DataSourceFactory for InstantSourceFactory {
        fn can_handle(&self, address: &DataAddress) -> bool {
            address.is_type("Instant")
        }
        fn validate(&self, _address: &DataAddress) -> Result<(), PipelineError> {
            Ok(())
        }
        fn create(&self, _request: &DataFlowRequest) -> Result<Box<dyn DataSource>, PipelineError> {
            Ok(Box::new(InstantSource))
        }
    }

    /// Sink that never finishes, for termination tests.
    struct StallingSink;

    #[async_trait]
    impl DataSink for StallingSink {
        async fn transfer(&mut self, _parts: PartStream) -> Result<TransferOutcome, PipelineError> {
            futures_util::future::pending::<()>().await;
            unreachable!()
        }
    }

    struct NullSink;

    #[async_trait]
    impl DataSink for NullSink {
        async fn transfer(&mut self, mut parts: PartStream) -> Result<TransferOutcome, PipelineError> {
            let mut outcome = TransferOutcome::default();
            while let Some(part) = parts.next().await {
                let part = part?;
                outcome.parts += 1;
                outcome.bytes += part.len() as u64;
            }
            Ok(outcome)
        }
    }

    struct TestSinkFactory {
        stall: bool,
    }

    impl DataSinkFactory for TestSinkFactory {
        fn can_handle(&self, address: &DataAddress) -> bool {
            address.is_type("TestSink")
        }
        fn validate(&self, _address: &DataAddress) -> Result<(), PipelineError> {
            Ok(())
        }
        fn create(&self, _request: &DataFlowRequest) -> Result<Box<dyn DataSink>, PipelineError> {
            if self.stall {
                Ok(Box::new(StallingSink))
            } else {
                Ok(Box::new(NullSink))
            }
        }
    }

    fn manager_with(
        stall: bool,
        max_flows: usize,
    ) -> (DataPlaneManager, mpsc::UnboundedReceiver<FlowCompletion>) {
        let mut pipeline = PipelineService::new();
        pipeline.register_source_factory(Arc::new(InstantSourceFactory));
        pipeline.register_sink_factory(Arc::new(TestSinkFactory { stall }));
        DataPlaneManager::new(
            Arc::new(pipeline),
            Arc::new(FlowRegistry::new()),
            create_event_bus(),
            max_flows,
        )
    }

    fn flow_request() -> DataFlowRequest {
        DataFlowRequest::new(
            "process-1",
            DataAddress::new("Instant"),
            DataAddress::new("TestSink"),
            FlowType::Push,
        )
    }

    #[tokio::test]
    async fn completed_flow_reports_outcome() {
        let (manager, mut completions) = manager_with(false, 4);
        manager.start(flow_request()).unwrap();

        let completion = completions.recv().await.unwrap();
        assert_eq!(completion.process_id, "process-1");
        let outcome = completion.result.unwrap();
        assert_eq!(outcome.parts, 1);
        assert_eq!(outcome.bytes, 4);
        assert_eq!(manager.registry().count(), 0);
    }

    #[tokio::test]
    async fn saturation_bound_is_enforced() {
        let (manager, _completions) = manager_with(true, 1);
        manager.start(flow_request()).unwrap();

        let err = manager.start(flow_request()).unwrap_err();
        assert!(matches!(err, DomainError::Saturated(_)));
    }

    #[tokio::test]
    async fn terminate_cancels_running_flow() {
        let (manager, mut completions) = manager_with(true, 4);
        manager.start(flow_request()).unwrap();
        assert_eq!(manager.registry().count(), 1);

        assert_eq!(manager.terminate_by_process("process-1"), 1);

        // The task unwinds without reporting a completion
        tokio::time::timeout(Duration::from_millis(200), async {
            while manager.registry().count() > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("flow should unregister after termination");
        assert!(completions.try_recv().is_err());
    }

    #[tokio::test]
    async fn invalid_request_is_rejected_upfront() {
        let (manager, _completions) = manager_with(false, 4);
        let request = DataFlowRequest::new(
            "process-1",
            DataAddress::new("Unknown"),
            DataAddress::new("TestSink"),
            FlowType::Push,
        );

        assert!(matches!(
            manager.start(request),
            Err(DomainError::Validation(_))
        ));
    }
}
