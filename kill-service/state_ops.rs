use async_trait::async_trait;

use crate::types::InstanceId;

/// The capability to remove an instance directly from authoritative state
/// (C4), used when the driver cannot be relied upon to make progress. A
/// failure here is swallowed and logged (§7 `ExpungeFailure`) and retried on
/// the next tick.
#[async_trait]
pub trait StateOpProcessor: Send + Sync {
    async fn force_expunge(&self, instance_id: &InstanceId) -> anyhow::Result<()>;
}
