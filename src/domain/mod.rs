//! Core domain entities, types and traits.

pub mod data_address;
pub mod data_flow;
pub mod error;
pub mod transfer_process;

pub use data_address::DataAddress;
pub use data_flow::{DataFlowRequest, DataFlowState, FlowType};
pub use error::{DomainError, DomainResult};
pub use transfer_process::{
    CallbackAddress, TransferProcess, TransferProcessRepository, TransferProcessState,
    TransferRequest, TransferType,
};
