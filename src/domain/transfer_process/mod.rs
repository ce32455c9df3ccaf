//! Transfer process — the central control-plane entity.

pub mod model;
pub mod repository;

pub use model::{
    CallbackAddress, TransferProcess, TransferProcessState, TransferRequest, TransferType,
};
pub use repository::{SharedTransferProcessRepository, TransferProcessRepository};
