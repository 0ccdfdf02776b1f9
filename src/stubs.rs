//! Stand-ins for the collaborators the kill-service core is specified only
//! against the interface of: the scheduler driver and the authoritative
//! state store. Wiring either to a real backend is outside this crate's
//! scope; these log what they would have done.

use async_trait::async_trait;
use kill_service::{DriverHandle, InstanceId, StateOpProcessor};
use tracing::info;

pub struct LoggingDriverHandle;

#[async_trait]
impl DriverHandle for LoggingDriverHandle {
    async fn kill_task(&self, driver_task_id: &str) -> anyhow::Result<()> {
        info!(driver_task_id, "would call scheduler driver kill_task");
        Ok(())
    }
}

pub struct LoggingStateOpProcessor;

#[async_trait]
impl StateOpProcessor for LoggingStateOpProcessor {
    async fn force_expunge(&self, instance_id: &InstanceId) -> anyhow::Result<()> {
        info!(%instance_id, "would force-expunge instance from authoritative state");
        Ok(())
    }
}
