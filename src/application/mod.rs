//! Business logic: transfer-process service, state machine, protocol
//! dispatch and event distribution.

pub mod dispatch;
pub mod events;
pub mod transfer;

pub use dispatch::{HttpRemoteMessageDispatcher, RemoteMessage, RemoteMessageDispatcher};
pub use events::{create_event_bus, Event, EventBus, SharedEventBus};
pub use transfer::{
    NoopProvisioner, Provisioner, TransferProcessManager, TransferProcessService,
};
