//! Data plane — executes the actual data movement for transfer processes.
//!
//! Movement happens through a pipeline: a [`pipeline::DataSource`] yields
//! parts, a [`pipeline::DataSink`] consumes them. Factories for both sides
//! are registered against data-address types in the
//! [`pipeline::PipelineService`]; the [`manager::DataPlaneManager`] runs one
//! pipeline task per flow and reports the outcome back to the control plane.

pub mod http_sink;
pub mod manager;
pub mod opcua;
pub mod pipeline;
pub mod registry;
pub mod token;
pub mod validation;

pub use manager::{DataPlaneManager, FlowCompletion};
pub use pipeline::{
    DataSink, DataSinkFactory, DataSource, DataSourceFactory, Part, PipelineError,
    PipelineService, TransferOutcome,
};
pub use registry::FlowRegistry;
pub use token::{DataPlaneClaims, TokenService};
