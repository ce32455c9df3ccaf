//! Transfer process state machine.
//!
//! A single background task ticks at a fixed interval, fetches a bounded
//! batch of processes per pending state and performs the side effect that
//! moves each one forward. Data-flow completions arrive over a channel and
//! are folded into the same loop, so every process is only ever advanced
//! from one place.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::application::dispatch::{RemoteMessage, RemoteMessageDispatcher};
use crate::application::events::{Event, SharedEventBus, TransferProcessEvent};
use crate::application::transfer::provision::Provisioner;
use crate::config::StateMachineConfig;
use crate::dataplane::{DataPlaneManager, FlowCompletion};
use crate::domain::{
    DataFlowRequest, DomainError, DomainResult, FlowType, SharedTransferProcessRepository,
    TransferProcess, TransferProcessState, TransferType,
};
use crate::shared::retry::{retry_with_backoff, RetryConfig};
use crate::shared::shutdown::ShutdownSignal;

/// States the machine actively works on. `REQUESTED` is absent on purpose:
/// a consumer process parks there until the counterparty signals the start.
const PENDING_STATES: [TransferProcessState; 8] = [
    TransferProcessState::Initial,
    TransferProcessState::Provisioned,
    TransferProcessState::Starting,
    TransferProcessState::Resuming,
    TransferProcessState::Suspending,
    TransferProcessState::Completing,
    TransferProcessState::Terminating,
    TransferProcessState::Deprovisioning,
];

pub struct TransferProcessManager {
    repository: SharedTransferProcessRepository,
    provisioner: Arc<dyn Provisioner>,
    dispatcher: Arc<dyn RemoteMessageDispatcher>,
    data_plane: Arc<DataPlaneManager>,
    event_bus: SharedEventBus,
    config: StateMachineConfig,
    completions: Mutex<Option<mpsc::UnboundedReceiver<FlowCompletion>>>,
}

impl TransferProcessManager {
    pub fn new(
        repository: SharedTransferProcessRepository,
        provisioner: Arc<dyn Provisioner>,
        dispatcher: Arc<dyn RemoteMessageDispatcher>,
        data_plane: Arc<DataPlaneManager>,
        event_bus: SharedEventBus,
        config: StateMachineConfig,
        completions: mpsc::UnboundedReceiver<FlowCompletion>,
    ) -> Self {
        Self {
            repository,
            provisioner,
            dispatcher,
            data_plane,
            event_bus,
            config,
            completions: Mutex::new(Some(completions)),
        }
    }

    /// Spawn the ticker; runs until shutdown.
    pub fn start(self: Arc<Self>, shutdown: ShutdownSignal) {
        let manager = self;
        tokio::spawn(async move {
            let mut completions = manager
                .completions
                .lock()
                .await
                .take()
                .expect("State machine started twice");
            let mut interval = tokio::time::interval(std::time::Duration::from_millis(
                manager.config.tick_interval_ms,
            ));
            info!("Transfer process state machine started");
            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    Some(completion) = completions.recv() => {
                        manager.handle_completion(completion).await;
                    }
                    _ = interval.tick() => {
                        manager.tick().await;
                    }
                }
            }
            info!("Transfer process state machine stopped");
        });
    }

    /// One pass over all pending states.
    pub async fn tick(&self) {
        let started = Instant::now();
        for state in PENDING_STATES {
            let batch = match self
                .repository
                .find_by_state(state, self.config.batch_size)
                .await
            {
                Ok(batch) => batch,
                Err(e) => {
                    error!(state = %state, error = %e, "Failed to fetch pending processes");
                    continue;
                }
            };
            for process in batch {
                self.advance(process).await;
            }
        }
        metrics::histogram!("state_machine_tick_duration_seconds")
            .record(started.elapsed().as_secs_f64());
    }

    /// Fold a data-plane outcome into the owning process.
    pub async fn handle_completion(&self, completion: FlowCompletion) {
        let mut process = match self.repository.find_by_id(&completion.process_id).await {
            Ok(Some(process)) => process,
            Ok(None) => {
                warn!(process_id = %completion.process_id, "Completion for unknown process");
                return;
            }
            Err(e) => {
                error!(process_id = %completion.process_id, error = %e, "Failed to load process");
                return;
            }
        };

        if process.state != TransferProcessState::Started {
            debug!(
                process_id = %process.id,
                state = %process.state,
                "Ignoring flow completion outside STARTED"
            );
            return;
        }

        let result = match completion.result {
            Ok(outcome) => {
                debug!(
                    process_id = %process.id,
                    parts = outcome.parts,
                    bytes = outcome.bytes,
                    "Data flow finished, completing process"
                );
                self.transition(&mut process, TransferProcessState::Completing)
                    .await
            }
            Err(detail) => self.fail(&mut process, detail).await,
        };
        if let Err(e) = result {
            error!(process_id = %process.id, error = %e, "Failed to apply flow completion");
        }
    }

    async fn advance(&self, mut process: TransferProcess) {
        let result = match process.state {
            TransferProcessState::Initial => self.provision(&mut process).await,
            TransferProcessState::Provisioned => self.request_or_start(&mut process).await,
            TransferProcessState::Starting => self.start_flow(&mut process).await,
            TransferProcessState::Resuming => {
                self.transition(&mut process, TransferProcessState::Starting)
                    .await
            }
            TransferProcessState::Suspending => self.suspend(&mut process).await,
            TransferProcessState::Completing => self.complete(&mut process).await,
            TransferProcessState::Terminating => self.terminate(&mut process).await,
            TransferProcessState::Deprovisioning => self.deprovision(&mut process).await,
            other => {
                debug!(process_id = %process.id, state = %other, "Nothing to do");
                Ok(())
            }
        };

        if let Err(e) = result {
            error!(process_id = %process.id, state = %process.state, error = %e, "State machine step failed");
        }
    }

    async fn provision(&self, process: &mut TransferProcess) -> DomainResult<()> {
        self.transition(process, TransferProcessState::Provisioning)
            .await?;
        match self.provisioner.provision(process).await {
            Ok(()) => {
                self.transition(process, TransferProcessState::Provisioned)
                    .await
            }
            Err(e) => self.fail(process, format!("Provisioning failed: {}", e)).await,
        }
    }

    async fn request_or_start(&self, process: &mut TransferProcess) -> DomainResult<()> {
        match process.transfer_type {
            TransferType::Provider => {
                self.transition(process, TransferProcessState::Starting).await
            }
            TransferType::Consumer => {
                self.transition(process, TransferProcessState::Requesting)
                    .await?;
                let message = RemoteMessage::TransferRequest {
                    process_id: process.id.clone(),
                    asset_id: process.asset_id.clone(),
                    contract_id: process.contract_id.clone(),
                    data_destination: process.data_destination.clone(),
                    counter_party_address: process.counter_party_address.clone(),
                };
                let dispatched = retry_with_backoff(
                    RetryConfig {
                        max_attempts: self.config.dispatch_max_attempts,
                        ..RetryConfig::default()
                    },
                    || self.dispatcher.dispatch(message.clone()),
                    DomainError::is_transient,
                    "dispatch_transfer_request",
                )
                .await;
                match dispatched {
                    Ok(()) => {
                        self.transition(process, TransferProcessState::Requested)
                            .await
                    }
                    Err(e) => self.fail(process, format!("Dispatch failed: {}", e)).await,
                }
            }
        }
    }

    async fn start_flow(&self, process: &mut TransferProcess) -> DomainResult<()> {
        // Consumer-pull destinations are served through the public data
        // endpoint; there is no pipeline to run on our side.
        if process.data_destination.is_type("HttpProxy") {
            self.transition(process, TransferProcessState::Started).await?;
            self.notify_counterparty(process, RemoteMessage::TransferStart {
                process_id: process.id.clone(),
                counter_party_address: process.counter_party_address.clone(),
            })
            .await;
            return Ok(());
        }

        let source = match &process.source_address {
            Some(source) => source.clone(),
            None => {
                return self
                    .fail(process, "No source address for push transfer".to_string())
                    .await;
            }
        };
        let request = DataFlowRequest::new(
            &process.id,
            source,
            process.data_destination.clone(),
            FlowType::Push,
        );

        match self.data_plane.start(request) {
            Ok(()) => {
                self.transition(process, TransferProcessState::Started).await?;
                self.notify_counterparty(process, RemoteMessage::TransferStart {
                    process_id: process.id.clone(),
                    counter_party_address: process.counter_party_address.clone(),
                })
                .await;
                Ok(())
            }
            Err(DomainError::Saturated(detail)) => {
                // Stay in STARTING; the next tick retries once capacity frees up
                debug!(process_id = %process.id, detail = %detail, "Data plane saturated, deferring start");
                Ok(())
            }
            Err(e) => self.fail(process, format!("Data flow rejected: {}", e)).await,
        }
    }

    async fn suspend(&self, process: &mut TransferProcess) -> DomainResult<()> {
        let stopped = self.data_plane.terminate_by_process(&process.id);
        debug!(process_id = %process.id, stopped, "Suspending transfer");
        self.transition(process, TransferProcessState::Suspended).await
    }

    async fn complete(&self, process: &mut TransferProcess) -> DomainResult<()> {
        self.transition(process, TransferProcessState::Completed).await?;
        metrics::counter!("transfer_processes_completed_total").increment(1);
        self.event_bus
            .publish(Event::TransferProcessCompleted(TransferProcessEvent {
                process_id: process.id.clone(),
                state: process.state,
                detail: None,
            }));
        self.notify_counterparty(process, RemoteMessage::TransferCompletion {
            process_id: process.id.clone(),
            counter_party_address: process.counter_party_address.clone(),
        })
        .await;
        Ok(())
    }

    async fn terminate(&self, process: &mut TransferProcess) -> DomainResult<()> {
        let stopped = self.data_plane.terminate_by_process(&process.id);
        if stopped > 0 {
            debug!(process_id = %process.id, stopped, "Stopped running flows");
        }
        self.notify_counterparty(process, RemoteMessage::TransferTermination {
            process_id: process.id.clone(),
            reason: process.error_detail.clone(),
            counter_party_address: process.counter_party_address.clone(),
        })
        .await;
        self.transition(process, TransferProcessState::Terminated).await?;
        metrics::counter!("transfer_processes_terminated_total").increment(1);
        self.event_bus
            .publish(Event::TransferProcessTerminated(TransferProcessEvent {
                process_id: process.id.clone(),
                state: process.state,
                detail: process.error_detail.clone(),
            }));
        Ok(())
    }

    async fn deprovision(&self, process: &mut TransferProcess) -> DomainResult<()> {
        match self.provisioner.deprovision(process).await {
            Ok(()) => {
                self.transition(process, TransferProcessState::Deprovisioned)
                    .await
            }
            Err(e) => {
                // Keep the process in DEPROVISIONING; the next tick retries
                warn!(process_id = %process.id, error = %e, "Deprovisioning failed, will retry");
                Ok(())
            }
        }
    }

    /// Terminate with an error detail, bypassing the reason-validation used
    /// for client-initiated terminations.
    async fn fail(&self, process: &mut TransferProcess, detail: String) -> DomainResult<()> {
        warn!(process_id = %process.id, detail = %detail, "Transfer failed");
        metrics::counter!("transfer_processes_failed_total").increment(1);
        process.error_detail = Some(detail);
        self.transition(process, TransferProcessState::Terminating).await
    }

    async fn transition(
        &self,
        process: &mut TransferProcess,
        next: TransferProcessState,
    ) -> DomainResult<()> {
        process.transition_to(next)?;
        self.repository.update(process.clone()).await?;
        metrics::counter!("transfer_process_transitions_total", "state" => next.as_str())
            .increment(1);
        self.event_bus
            .publish(Event::TransferProcessStateChanged(TransferProcessEvent {
                process_id: process.id.clone(),
                state: next,
                detail: None,
            }));
        Ok(())
    }

    async fn notify_counterparty(&self, process: &TransferProcess, message: RemoteMessage) {
        // Best effort; the counterparty polls our state if it misses this
        if let Err(e) = self.dispatcher.dispatch(message).await {
            warn!(process_id = %process.id, error = %e, "Counterparty notification failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::events::create_event_bus;
    use crate::application::transfer::provision::NoopProvisioner;
    use crate::dataplane::pipeline::{
        DataSink, DataSinkFactory, DataSource, DataSourceFactory, Part, PartStream,
        PipelineError, PipelineService, TransferOutcome,
    };
    use crate::domain::{DataAddress, TransferRequest};
    use crate::infrastructure::storage::InMemoryTransferProcessRepository;
    use async_trait::async_trait;
    use futures_util::{stream, StreamExt};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    // ── Test doubles ───────────────────────────────────────────

    #[derive(Default)]
    struct RecordingDispatcher {
        sent: StdMutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl RemoteMessageDispatcher for RecordingDispatcher {
        fn protocol(&self) -> &str {
            "dataspace-protocol-http"
        }

        async fn dispatch(&self, message: RemoteMessage) -> DomainResult<()> {
            if self.fail {
                return Err(DomainError::Dispatch("counterparty down".to_string()));
            }
            self.sent.lock().unwrap().push(message.path());
            Ok(())
        }
    }

    struct OneShotSource;

    #[async_trait]
    impl DataSource for OneShotSource {
        async fn open_parts(&mut self) -> Result<PartStream, PipelineError> {
            Ok(stream::iter(vec![Ok(Part::new("node", "21.5"))]).boxed())
        }
    }

    struct OneShotSourceFactory;

    impl DataSourceFactory for OneShotSourceFactory {
        fn can_handle(&self, address: &DataAddress) -> bool {
            address.is_type("TestSource")
        }
        fn validate(&self, _address: &DataAddress) -> Result<(), PipelineError> {
            Ok(())
        }
        fn create(&self, _request: &DataFlowRequest) -> Result<Box<dyn DataSource>, PipelineError> {
            Ok(Box::new(OneShotSource))
        }
    }

    struct CountingSink(Arc<AtomicUsize>);

    #[async_trait]
    impl DataSink for CountingSink {
        async fn transfer(&mut self, mut parts: PartStream) -> Result<TransferOutcome, PipelineError> {
            let mut outcome = TransferOutcome::default();
            while let Some(part) = parts.next().await {
                let part = part?;
                outcome.parts += 1;
                outcome.bytes += part.len() as u64;
                self.0.fetch_add(1, Ordering::SeqCst);
            }
            Ok(outcome)
        }
    }

    struct CountingSinkFactory(Arc<AtomicUsize>);

    impl DataSinkFactory for CountingSinkFactory {
        fn can_handle(&self, address: &DataAddress) -> bool {
            address.is_type("TestSink")
        }
        fn validate(&self, _address: &DataAddress) -> Result<(), PipelineError> {
            Ok(())
        }
        fn create(&self, _request: &DataFlowRequest) -> Result<Box<dyn DataSink>, PipelineError> {
            Ok(Box::new(CountingSink(self.0.clone())))
        }
    }

    // ── Harness ────────────────────────────────────────────────

    struct Harness {
        manager: TransferProcessManager,
        repository: SharedTransferProcessRepository,
        dispatcher: Arc<RecordingDispatcher>,
        completions: mpsc::UnboundedReceiver<FlowCompletion>,
        parts_delivered: Arc<AtomicUsize>,
    }

    fn harness(dispatcher_fails: bool) -> Harness {
        let repository: SharedTransferProcessRepository =
            Arc::new(InMemoryTransferProcessRepository::new());
        let dispatcher = Arc::new(RecordingDispatcher {
            sent: StdMutex::new(vec![]),
            fail: dispatcher_fails,
        });
        let parts_delivered = Arc::new(AtomicUsize::new(0));

        let mut pipeline = PipelineService::new();
        pipeline.register_source_factory(Arc::new(OneShotSourceFactory));
        pipeline.register_sink_factory(Arc::new(CountingSinkFactory(parts_delivered.clone())));

        let event_bus = create_event_bus();
        let (data_plane, completions) = DataPlaneManager::new(
            Arc::new(pipeline),
            Arc::new(crate::dataplane::FlowRegistry::new()),
            event_bus.clone(),
            8,
        );

        let config = StateMachineConfig {
            tick_interval_ms: 10,
            batch_size: 16,
            dispatch_max_attempts: 2,
        };
        let (_tx, unused_rx) = mpsc::unbounded_channel();
        let manager = TransferProcessManager::new(
            repository.clone(),
            Arc::new(NoopProvisioner),
            dispatcher.clone(),
            Arc::new(data_plane),
            event_bus,
            config,
            unused_rx,
        );

        Harness {
            manager,
            repository,
            dispatcher,
            completions,
            parts_delivered,
        }
    }

    fn request(transfer_type: TransferType) -> TransferRequest {
        TransferRequest {
            id: Some("process-1".to_string()),
            transfer_type,
            protocol: "dataspace-protocol-http".to_string(),
            counter_party_address: "http://peer:8282".to_string(),
            counter_party_id: None,
            asset_id: "asset-1".to_string(),
            contract_id: "contract-1".to_string(),
            source_address: Some(DataAddress::new("TestSource")),
            data_destination: DataAddress::new("TestSink"),
            callback_addresses: vec![],
            properties: HashMap::new(),
        }
    }

    async fn state_of(harness: &Harness) -> TransferProcessState {
        harness
            .repository
            .find_by_id("process-1")
            .await
            .unwrap()
            .unwrap()
            .state
    }

    #[tokio::test]
    async fn provider_process_runs_to_completed() {
        let mut harness = harness(false);
        harness
            .repository
            .save(TransferProcess::new(request(TransferType::Provider)))
            .await
            .unwrap();

        // A tick works the pending states in order, so the process cascades
        // Initial -> Provisioned -> Starting -> Started within one pass
        harness.manager.tick().await;
        assert_eq!(state_of(&harness).await, TransferProcessState::Started);

        // The pipeline runs to completion and reports back
        let completion = harness.completions.recv().await.unwrap();
        harness.manager.handle_completion(completion).await;
        assert_eq!(state_of(&harness).await, TransferProcessState::Completing);

        harness.manager.tick().await;
        assert_eq!(state_of(&harness).await, TransferProcessState::Completed);
        assert_eq!(harness.parts_delivered.load(Ordering::SeqCst), 1);

        let sent = harness.dispatcher.sent.lock().unwrap();
        assert!(sent.iter().any(|p| p.ends_with("/start")));
        assert!(sent.iter().any(|p| p.ends_with("/completion")));
    }

    #[tokio::test]
    async fn consumer_process_parks_in_requested() {
        let harness = harness(false);
        harness
            .repository
            .save(TransferProcess::new(request(TransferType::Consumer)))
            .await
            .unwrap();

        harness.manager.tick().await;
        assert_eq!(state_of(&harness).await, TransferProcessState::Requested);

        // Further ticks leave it parked until the counterparty signals
        harness.manager.tick().await;
        assert_eq!(state_of(&harness).await, TransferProcessState::Requested);

        let sent = harness.dispatcher.sent.lock().unwrap();
        assert_eq!(sent.as_slice(), ["/transfers/request"]);
    }

    #[tokio::test]
    async fn consumer_dispatch_failure_terminates_process() {
        let harness = harness(true);
        harness
            .repository
            .save(TransferProcess::new(request(TransferType::Consumer)))
            .await
            .unwrap();

        // Dispatch fails after retries; the Terminating batch later in the
        // same tick finishes the job
        harness.manager.tick().await;
        assert_eq!(state_of(&harness).await, TransferProcessState::Terminated);
        let process = harness
            .repository
            .find_by_id("process-1")
            .await
            .unwrap()
            .unwrap();
        assert!(process.error_detail.unwrap().contains("Dispatch failed"));
    }

    #[tokio::test]
    async fn failed_flow_terminates_process() {
        let harness = harness(false);
        let mut process = TransferProcess::new(request(TransferType::Provider));
        for next in [
            TransferProcessState::Provisioning,
            TransferProcessState::Provisioned,
            TransferProcessState::Starting,
            TransferProcessState::Started,
        ] {
            process.transition_to(next).unwrap();
        }
        harness.repository.save(process).await.unwrap();

        harness
            .manager
            .handle_completion(FlowCompletion {
                flow_id: "flow-1".to_string(),
                process_id: "process-1".to_string(),
                result: Err("sink exploded".to_string()),
            })
            .await;
        assert_eq!(state_of(&harness).await, TransferProcessState::Terminating);

        harness.manager.tick().await;
        assert_eq!(state_of(&harness).await, TransferProcessState::Terminated);
    }

    #[tokio::test]
    async fn pull_destination_skips_pipeline() {
        let harness = harness(false);
        let mut req = request(TransferType::Provider);
        req.data_destination = DataAddress::new("HttpProxy");
        harness
            .repository
            .save(TransferProcess::new(req))
            .await
            .unwrap();

        harness.manager.tick().await;
        assert_eq!(state_of(&harness).await, TransferProcessState::Started);
        assert_eq!(harness.parts_delivered.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn deprovisioning_reaches_deprovisioned() {
        let harness = harness(false);
        let mut process = TransferProcess::new(request(TransferType::Provider));
        process.terminate("done with it").unwrap();
        process
            .transition_to(TransferProcessState::Terminated)
            .unwrap();
        process
            .transition_to(TransferProcessState::Deprovisioning)
            .unwrap();
        harness.repository.save(process).await.unwrap();

        harness.manager.tick().await;
        assert_eq!(state_of(&harness).await, TransferProcessState::Deprovisioned);
    }
}
