//! Event distribution for transfer processes and data flows.

pub mod callback;
mod event_bus;
mod events;

pub use callback::CallbackDispatcher;
pub use event_bus::{create_event_bus, EventBus, EventSubscriber, SharedEventBus};
pub use events::{DataFlowEvent, Event, EventMessage, TransferProcessEvent};
