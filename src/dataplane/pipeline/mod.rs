//! Pipeline SPI — the contract between the data plane and its adapters.

mod service;

pub use service::PipelineService;

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::Stream;
use thiserror::Error;

use crate::domain::{DataAddress, DataFlowRequest};

/// One named chunk of payload flowing through a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub name: String,
    pub content: Bytes,
}

impl Part {
    pub fn new(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Stream of parts produced by a source.
pub type PartStream = Pin<Box<dyn Stream<Item = Result<Part, PipelineError>> + Send>>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid data address: {0}")]
    Validation(String),

    #[error("No source factory for address type `{0}`")]
    UnsupportedSource(String),

    #[error("No sink factory for address type `{0}`")]
    UnsupportedSink(String),

    #[error("Source failure: {0}")]
    Source(String),

    #[error("Sink failure: {0}")]
    Sink(String),

    #[error("Flow was terminated")]
    Terminated,
}

/// Totals reported by a sink after draining a source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferOutcome {
    pub parts: u64,
    pub bytes: u64,
}

/// Produces parts from wherever the source address points.
#[async_trait]
pub trait DataSource: Send {
    async fn open_parts(&mut self) -> Result<PartStream, PipelineError>;
    /// Release held resources (connections, sessions). Idempotent.
    async fn close(&mut self) {}
}

/// Consumes a part stream, delivering it to the destination address.
#[async_trait]
pub trait DataSink: Send {
    async fn transfer(&mut self, parts: PartStream) -> Result<TransferOutcome, PipelineError>;
}

/// Builds sources for a family of address types.
pub trait DataSourceFactory: Send + Sync {
    fn can_handle(&self, address: &DataAddress) -> bool;
    fn validate(&self, address: &DataAddress) -> Result<(), PipelineError>;
    fn create(&self, request: &DataFlowRequest) -> Result<Box<dyn DataSource>, PipelineError>;
}

/// Builds sinks for a family of address types.
pub trait DataSinkFactory: Send + Sync {
    fn can_handle(&self, address: &DataAddress) -> bool;
    fn validate(&self, address: &DataAddress) -> Result<(), PipelineError>;
    fn create(&self, request: &DataFlowRequest) -> Result<Box<dyn DataSink>, PipelineError>;
}
