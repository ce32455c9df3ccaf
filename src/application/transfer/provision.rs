//! Resource provisioning hooks.
//!
//! Provisioning prepares whatever a transfer needs before data moves
//! (credentials, staging areas); deprovisioning tears it down afterwards.
//! Deployments plug their own implementation; the default is pass-through.

use async_trait::async_trait;

use crate::domain::{DomainResult, TransferProcess};

#[async_trait]
pub trait Provisioner: Send + Sync {
    async fn provision(&self, process: &TransferProcess) -> DomainResult<()>;
    async fn deprovision(&self, process: &TransferProcess) -> DomainResult<()>;
}

/// Pass-through provisioner for transfers that need no preparation.
pub struct NoopProvisioner;

#[async_trait]
impl Provisioner for NoopProvisioner {
    async fn provision(&self, _process: &TransferProcess) -> DomainResult<()> {
        Ok(())
    }

    async fn deprovision(&self, _process: &TransferProcess) -> DomainResult<()> {
        Ok(())
    }
}
