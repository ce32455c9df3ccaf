//! Cross-cutting helpers shared by the control plane and the data plane.

pub mod retry;
pub mod shutdown;
