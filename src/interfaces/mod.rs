//! Inbound interfaces (REST management API, public data API).

pub mod http;
