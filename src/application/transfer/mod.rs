//! Transfer-process orchestration.

pub mod provision;
pub mod service;
pub mod state_machine;

pub use provision::{NoopProvisioner, Provisioner};
pub use service::TransferProcessService;
pub use state_machine::TransferProcessManager;
