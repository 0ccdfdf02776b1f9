use thiserror::Error;

use crate::types::InstanceId;

/// Internal failure modes the core logs and recovers from on its own (§7).
/// None of these propagate to callers of [`crate::KillServiceHandle`]: a
/// caller only ever sees the kill accepted for processing or the completion
/// handle resolve/get cancelled.
#[derive(Debug, Error)]
pub enum KillServiceError {
    #[error("driver unavailable while killing task {driver_task_id} of instance {instance_id}: {source}")]
    DriverUnavailable {
        instance_id: InstanceId,
        driver_task_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("force-expunge failed for instance {instance_id}: {source}")]
    ExpungeFailure {
        instance_id: InstanceId,
        #[source]
        source: anyhow::Error,
    },
}
