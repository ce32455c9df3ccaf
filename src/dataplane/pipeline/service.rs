//! Pipeline service — adapter registry and transfer execution.

use std::sync::Arc;

use tracing::debug;

use super::{
    DataSink, DataSinkFactory, DataSource, DataSourceFactory, PipelineError, TransferOutcome,
};
use crate::domain::{DataAddress, DataFlowRequest};

/// Registry of source and sink factories. Factories are registered during
/// startup; afterwards the service is shared immutably.
#[derive(Default)]
pub struct PipelineService {
    source_factories: Vec<Arc<dyn DataSourceFactory>>,
    sink_factories: Vec<Arc<dyn DataSinkFactory>>,
}

impl PipelineService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_source_factory(&mut self, factory: Arc<dyn DataSourceFactory>) {
        self.source_factories.push(factory);
    }

    pub fn register_sink_factory(&mut self, factory: Arc<dyn DataSinkFactory>) {
        self.sink_factories.push(factory);
    }

    fn resolve_source(
        &self,
        address: &DataAddress,
    ) -> Result<&Arc<dyn DataSourceFactory>, PipelineError> {
        self.source_factories
            .iter()
            .find(|f| f.can_handle(address))
            .ok_or_else(|| PipelineError::UnsupportedSource(address.address_type.clone()))
    }

    fn resolve_sink(
        &self,
        address: &DataAddress,
    ) -> Result<&Arc<dyn DataSinkFactory>, PipelineError> {
        self.sink_factories
            .iter()
            .find(|f| f.can_handle(address))
            .ok_or_else(|| PipelineError::UnsupportedSink(address.address_type.clone()))
    }

    /// Check that both sides of the request can be served and carry valid
    /// addresses, without creating anything.
    pub fn validate(&self, request: &DataFlowRequest) -> Result<(), PipelineError> {
        self.resolve_source(&request.source)?
            .validate(&request.source)?;
        self.resolve_sink(&request.destination)?
            .validate(&request.destination)
    }

    /// Open only the source side of a request (consumer-pull serving).
    pub fn open_source(
        &self,
        request: &DataFlowRequest,
    ) -> Result<Box<dyn DataSource>, PipelineError> {
        let factory = self.resolve_source(&request.source)?;
        factory.validate(&request.source)?;
        factory.create(request)
    }

    /// Run the full pipeline: create both ends, drain the source into the
    /// sink, close the source.
    pub async fn transfer(
        &self,
        request: &DataFlowRequest,
    ) -> Result<TransferOutcome, PipelineError> {
        self.validate(request)?;
        let mut source = self.resolve_source(&request.source)?.create(request)?;
        let mut sink: Box<dyn DataSink> =
            self.resolve_sink(&request.destination)?.create(request)?;

        debug!(
            flow_id = %request.flow_id,
            source = %request.source.address_type,
            destination = %request.destination.address_type,
            "Opening pipeline"
        );

        let result = match source.open_parts().await {
            Ok(parts) => sink.transfer(parts).await,
            Err(e) => Err(e),
        };
        source.close().await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FlowType;
    use async_trait::async_trait;
    use futures_util::{stream, StreamExt};
    use std::sync::Mutex;

    use crate::dataplane::pipeline::{Part, PartStream};

    struct StubSource {
        parts: Vec<Part>,
    }

    #[async_trait]
    impl DataSource for StubSource {
        async fn open_parts(&mut self) -> Result<PartStream, PipelineError> {
            let parts: Vec<Result<Part, PipelineError>> =
                self.parts.drain(..).map(Ok).collect();
            Ok(stream::iter(parts).boxed())
        }
    }

    struct StubSourceFactory;

    impl DataSourceFactory for StubSourceFactory {
        fn can_handle(&self, address: &DataAddress) -> bool {
            address.is_type("Stub")
        }

        fn validate(&self, address: &DataAddress) -> Result<(), PipelineError> {
            address
                .property("data")
                .map(|_| ())
                .ok_or_else(|| PipelineError::Validation("Missing `data` property".into()))
        }

        fn create(
            &self,
            request: &DataFlowRequest,
        ) -> Result<Box<dyn DataSource>, PipelineError> {
            let data = request.source.required_property("data").unwrap().to_string();
            Ok(Box::new(StubSource {
                parts: vec![Part::new("stub", data.into_bytes())],
            }))
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSink {
        received: Arc<Mutex<Vec<Part>>>,
    }

    #[async_trait]
    impl DataSink for RecordingSink {
        async fn transfer(
            &mut self,
            mut parts: PartStream,
        ) -> Result<TransferOutcome, PipelineError> {
            let mut outcome = TransferOutcome::default();
            while let Some(part) = parts.next().await {
                let part = part?;
                outcome.parts += 1;
                outcome.bytes += part.len() as u64;
                self.received.lock().unwrap().push(part);
            }
            Ok(outcome)
        }
    }

    struct RecordingSinkFactory {
        sink: RecordingSink,
    }

    impl DataSinkFactory for RecordingSinkFactory {
        fn can_handle(&self, address: &DataAddress) -> bool {
            address.is_type("Recorder")
        }

        fn validate(&self, _address: &DataAddress) -> Result<(), PipelineError> {
            Ok(())
        }

        fn create(&self, _request: &DataFlowRequest) -> Result<Box<dyn DataSink>, PipelineError> {
            Ok(Box::new(self.sink.clone()))
        }
    }

    fn service_with_stubs() -> (PipelineService, RecordingSink) {
        let sink = RecordingSink::default();
        let mut service = PipelineService::new();
        service.register_source_factory(Arc::new(StubSourceFactory));
        service.register_sink_factory(Arc::new(RecordingSinkFactory { sink: sink.clone() }));
        (service, sink)
    }

    fn flow_request(source: DataAddress, destination: DataAddress) -> DataFlowRequest {
        DataFlowRequest::new("process-1", source, destination, FlowType::Push)
    }

    #[tokio::test]
    async fn transfer_moves_all_parts() {
        let (service, sink) = service_with_stubs();
        let request = flow_request(
            DataAddress::new("Stub").with_property("data", "hello"),
            DataAddress::new("Recorder"),
        );

        let outcome = service.transfer(&request).await.unwrap();

        assert_eq!(outcome.parts, 1);
        assert_eq!(outcome.bytes, 5);
        let received = sink.received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].name, "stub");
    }

    #[tokio::test]
    async fn unknown_source_type_is_rejected() {
        let (service, _) = service_with_stubs();
        let request = flow_request(DataAddress::new("Nope"), DataAddress::new("Recorder"));

        let err = service.validate(&request).unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedSource(t) if t == "Nope"));
    }

    #[tokio::test]
    async fn unknown_sink_type_is_rejected() {
        let (service, _) = service_with_stubs();
        let request = flow_request(
            DataAddress::new("Stub").with_property("data", "x"),
            DataAddress::new("Nope"),
        );

        let err = service.validate(&request).unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedSink(t) if t == "Nope"));
    }

    #[tokio::test]
    async fn invalid_source_address_fails_validation() {
        let (service, _) = service_with_stubs();
        let request = flow_request(DataAddress::new("Stub"), DataAddress::new("Recorder"));

        let err = service.validate(&request).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }
}
