use async_trait::async_trait;

/// The opaque outbound capability to the cluster scheduler (C3). Delivery is
/// unreliable from the core's point of view: a failure here is swallowed and
/// logged (§7 `DriverUnavailable`), and the entry is simply retried later.
#[async_trait]
pub trait DriverHandle: Send + Sync {
    /// Best-effort kill of a single task. The return value is advisory only
    /// — the core does not treat `Ok` as confirmation of anything; it keeps
    /// waiting for a terminal event either way.
    async fn kill_task(&self, driver_task_id: &str) -> anyhow::Result<()>;
}
