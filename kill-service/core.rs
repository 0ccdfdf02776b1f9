use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use metrics::{gauge, increment_counter};
use tokio::sync::{broadcast, mpsc};
use tracing::{error, warn};

use crate::clock::Clock;
use crate::driver::DriverHandle;
use crate::error::KillServiceError;
use crate::events::EventBus;
use crate::retry::RetryTimer;
use crate::state_ops::StateOpProcessor;
use crate::types::{InstanceId, InstanceSnapshot, TaskId, ToKill};
use crate::watcher::{self, Completion};

/// Tunables a deployment supplies at construction time (§6).
#[derive(Debug, Clone)]
pub struct KillServiceConfig {
    pub kill_chunk_size: usize,
    pub kill_retry_timeout: Duration,
    /// Attempt budget before force-expunge; `None` means unbounded.
    pub kill_retry_max: Option<u32>,
}

enum Command {
    KillInstances(Vec<InstanceSnapshot>),
    KillUnknownTask(TaskId),
}

/// The handle callers interact with (§6 inbound interface). Cheap to clone;
/// every clone shares the same mailbox and event bus.
#[derive(Clone)]
pub struct KillServiceHandle {
    commands: mpsc::UnboundedSender<Command>,
    bus: Arc<EventBus>,
}

impl KillServiceHandle {
    /// §4.1 `killInstances`. The watcher is registered against the event bus
    /// before this call returns, so no terminal event the submission itself
    /// provokes can be missed (§4.5).
    pub fn kill_instances(&self, instances: Vec<InstanceSnapshot>) -> Completion {
        let ids = instances.iter().map(|i| i.instance_id.clone()).collect();
        let completion = watcher::register(ids, &self.bus);
        let _ = self.commands.send(Command::KillInstances(instances));
        completion
    }

    /// §4.1 `killUnknownTaskById`. Fire-and-forget; no completion handle.
    pub fn kill_unknown_task_by_id(&self, task_id: TaskId) {
        let _ = self.commands.send(Command::KillUnknownTask(task_id));
    }
}

/// The single-threaded mailbox actor that owns the pending/in-flight tables
/// (C7). All table mutation happens inside [`KillServiceCore::run`]; nothing
/// else ever touches `pending` or `in_flight`.
pub struct KillServiceCore {
    config: KillServiceConfig,
    clock: Arc<dyn Clock>,
    driver: Arc<dyn DriverHandle>,
    state_ops: Arc<dyn StateOpProcessor>,
    bus: Arc<EventBus>,
    retry_timer: Arc<RetryTimer>,
    retry_tick_tx: mpsc::UnboundedSender<()>,
    pending: HashMap<InstanceId, ToKill>,
    in_flight: HashMap<InstanceId, ToKill>,
}

impl KillServiceCore {
    pub fn create_and_start(
        config: KillServiceConfig,
        clock: Arc<dyn Clock>,
        driver: Arc<dyn DriverHandle>,
        state_ops: Arc<dyn StateOpProcessor>,
        bus: Arc<EventBus>,
        shutdown: broadcast::Receiver<()>,
    ) -> KillServiceHandle {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (tick_tx, tick_rx) = mpsc::unbounded_channel();
        let retry_timer = Arc::new(RetryTimer::new(config.kill_retry_timeout));

        let core = Self {
            config,
            clock,
            driver,
            state_ops,
            bus: bus.clone(),
            retry_timer,
            retry_tick_tx: tick_tx,
            pending: HashMap::new(),
            in_flight: HashMap::new(),
        };

        tokio::spawn(core.run(commands_rx, tick_rx, shutdown));

        KillServiceHandle {
            commands: commands_tx,
            bus,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut ticks: mpsc::UnboundedReceiver<()>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let mut bus_events = self.bus.subscribe();

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                cmd = commands.recv() => {
                    match cmd {
                        | Some(cmd) => self.handle_command(cmd).await,
                        | None => break,
                    }
                }
                tick = ticks.recv() => {
                    match tick {
                        | Some(()) => self.handle_retry_tick().await,
                        | None => break,
                    }
                }
                event = bus_events.recv() => self.handle_bus_event(event).await,
            }
        }

        self.on_shutdown().await;
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            | Command::KillInstances(instances) => self.handle_kill_instances(instances).await,
            | Command::KillUnknownTask(task_id) => self.handle_kill_unknown_task(task_id).await,
        }
    }

    async fn handle_bus_event(
        &mut self,
        event: Result<crate::events::BusEvent, broadcast::error::RecvError>,
    ) {
        match event {
            | Ok(event) => {
                if let Some(id) = event.terminal_instance_id().cloned() {
                    self.handle_terminal_event(id).await;
                }
            }
            | Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "kill-service core lagged behind the event bus");
            }
            | Err(broadcast::error::RecvError::Closed) => {}
        }
    }

    /// §4.1 step 2–3.
    async fn handle_kill_instances(&mut self, instances: Vec<InstanceSnapshot>) {
        for instance in instances {
            let instance_id = instance.instance_id.clone();
            self.pending.remove(&instance_id);
            self.in_flight.remove(&instance_id);
            self.pending
                .insert(instance_id, ToKill::from_submission(instance));
        }
        self.dispatch_pass().await;
    }

    /// §4.1 `killUnknownTaskById`.
    async fn handle_kill_unknown_task(&mut self, task_id: TaskId) {
        let instance_id = task_id.instance_id.clone();
        self.pending.remove(&instance_id);
        self.in_flight.remove(&instance_id);
        self.pending
            .insert(instance_id, ToKill::from_unknown_task(task_id));
        self.dispatch_pass().await;
    }

    /// §4.3.
    async fn handle_terminal_event(&mut self, instance_id: InstanceId) {
        let removed_pending = self.pending.remove(&instance_id).is_some();
        let removed_in_flight = self.in_flight.remove(&instance_id).is_some();
        if removed_pending || removed_in_flight {
            increment_counter!("kill_service.terminal_events_total");
            self.dispatch_pass().await;
        }
    }

    /// §4.4.
    async fn handle_retry_tick(&mut self) {
        let now = self.clock.now();
        let timeout = self.config.kill_retry_timeout;

        let due: Vec<InstanceId> = self
            .in_flight
            .iter()
            .filter(|(_, entry)| {
                entry
                    .issued_at
                    .is_some_and(|issued_at| now.duration_since(issued_at) >= timeout)
            })
            .map(|(id, _)| id.clone())
            .collect();

        for instance_id in due {
            let Some(entry) = self.in_flight.get(&instance_id) else {
                continue;
            };
            let exhausted = self
                .config
                .kill_retry_max
                .is_some_and(|max| entry.attempts >= max);

            if exhausted {
                // Left in-flight on purpose (§4.4): a terminal event is
                // expected to clean it up, not this tick.
                self.force_expunge(instance_id);
            } else if let Some(entry) = self.in_flight.remove(&instance_id) {
                increment_counter!("kill_service.retries_total");
                self.issue(entry).await;
            }
        }

        self.sync_retry_timer().await;
        self.record_table_gauges();
    }

    /// §4.2.
    async fn dispatch_pass(&mut self) {
        let budget = self
            .config
            .kill_chunk_size
            .saturating_sub(self.in_flight.len());

        if budget > 0 {
            let mut ids: Vec<InstanceId> = self.pending.keys().cloned().collect();
            ids.sort();

            for instance_id in ids.into_iter().take(budget) {
                if let Some(entry) = self.pending.remove(&instance_id) {
                    self.issue(entry).await;
                }
            }
        }

        self.sync_retry_timer().await;
        self.record_table_gauges();
    }

    /// `issue(e)`, §4.2 steps 1–5.
    async fn issue(&mut self, mut entry: ToKill) {
        let is_lost = entry.is_lost();
        let all_terminal = entry.all_terminal();

        if is_lost || all_terminal {
            self.force_expunge(entry.instance_id.clone());
        } else {
            for task_id in entry.task_ids.clone() {
                self.kill_task(task_id);
            }
        }

        entry.attempts += 1;
        entry.issued_at = Some(self.clock.now());
        self.in_flight.insert(entry.instance_id.clone(), entry);
    }

    /// Best-effort, fire-and-forget driver call (§5 suspension points).
    fn kill_task(&self, task_id: TaskId) {
        increment_counter!("kill_service.kills_issued_total");
        let driver = self.driver.clone();
        tokio::spawn(async move {
            if let Err(source) = driver.kill_task(&task_id.driver_task_id).await {
                let err = KillServiceError::DriverUnavailable {
                    instance_id: task_id.instance_id.clone(),
                    driver_task_id: task_id.driver_task_id.clone(),
                    source,
                };
                warn!(error = %err, "driver kill failed, will retry");
            }
        });
    }

    /// Best-effort, fire-and-forget expunge call (§5 suspension points).
    fn force_expunge(&self, instance_id: InstanceId) {
        increment_counter!("kill_service.force_expunges_total");
        let state_ops = self.state_ops.clone();
        tokio::spawn(async move {
            if let Err(source) = state_ops.force_expunge(&instance_id).await {
                let err = KillServiceError::ExpungeFailure {
                    instance_id: instance_id.clone(),
                    source,
                };
                error!(error = %err, "force-expunge failed, will retry");
            }
        });
    }

    /// Invariant 4: armed iff in-flight is non-empty.
    async fn sync_retry_timer(&self) {
        if self.in_flight.is_empty() {
            self.retry_timer.disarm().await;
        } else {
            self.retry_timer.arm(self.retry_tick_tx.clone()).await;
        }
    }

    fn record_table_gauges(&self) {
        gauge!("kill_service.pending_total", self.pending.len() as f64);
        gauge!("kill_service.inflight_total", self.in_flight.len() as f64);
    }

    async fn on_shutdown(&self) {
        self.retry_timer.disarm().await;
        if !self.pending.is_empty() || !self.in_flight.is_empty() {
            warn!(
                pending = self.pending.len(),
                in_flight = self.in_flight.len(),
                "kill-service core stopped with residual entries; next incarnation must \
                 re-submit them"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::broadcast;

    use super::*;
    use crate::events::{BusEvent, InstanceCondition};
    use crate::testutil::{FakeClock, RecordingDriver, RecordingStateOps};
    use crate::types::TaskSnapshot;

    fn snapshot(instance_id: &str, driver_task_id: &str) -> InstanceSnapshot {
        InstanceSnapshot {
            instance_id: InstanceId::new(instance_id),
            tasks: vec![TaskSnapshot {
                task_id: TaskId::new(InstanceId::new(instance_id), driver_task_id.to_string()),
                is_terminal: false,
            }],
            is_gone: false,
            is_unknown: false,
            is_dropped: false,
            is_unreachable: false,
            is_unreachable_inactive: false,
        }
    }

    fn start(
        config: KillServiceConfig,
    ) -> (
        KillServiceHandle,
        FakeClock,
        RecordingDriver,
        RecordingStateOps,
        Arc<EventBus>,
    ) {
        let clock = FakeClock::new();
        let driver = RecordingDriver::new();
        let state_ops = RecordingStateOps::new();
        let bus = Arc::new(EventBus::default());
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = KillServiceCore::create_and_start(
            config,
            Arc::new(clock.clone()),
            Arc::new(driver.clone()),
            Arc::new(state_ops.clone()),
            bus.clone(),
            shutdown_rx,
        );

        (handle, clock, driver, state_ops, bus)
    }

    fn terminal(instance_id: &str, condition: InstanceCondition) -> BusEvent {
        BusEvent::InstanceChanged {
            instance_id: InstanceId::new(instance_id),
            condition,
        }
    }

    #[tokio::test]
    async fn happy_path_resolves_after_both_terminal() {
        let (handle, _clock, driver, _state_ops, bus) = start(KillServiceConfig {
            kill_chunk_size: 2,
            kill_retry_timeout: Duration::from_secs(10),
            kill_retry_max: Some(3),
        });

        let completion = handle.kill_instances(vec![snapshot("A", "ta"), snapshot("B", "tb")]);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(driver.call_count(), 2);

        bus.publish(terminal("A", InstanceCondition::Killed));
        bus.publish(terminal("B", InstanceCondition::Killed));

        assert!(completion.wait().await.is_ok());
    }

    #[tokio::test]
    async fn chunking_dispatches_remainder_as_capacity_frees() {
        let (handle, _clock, driver, _state_ops, bus) = start(KillServiceConfig {
            kill_chunk_size: 2,
            kill_retry_timeout: Duration::from_secs(10),
            kill_retry_max: Some(3),
        });

        let completion = handle.kill_instances(vec![
            snapshot("A", "ta"),
            snapshot("B", "tb"),
            snapshot("C", "tc"),
        ]);

        tokio::time::sleep(Duration::from_millis(20)).await;
        // A, B sort ahead of C; only two fit in the chunk.
        assert_eq!(driver.call_count(), 2);

        bus.publish(terminal("A", InstanceCondition::Killed));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(driver.call_count(), 3);

        bus.publish(terminal("B", InstanceCondition::Killed));
        bus.publish(terminal("C", InstanceCondition::Killed));

        assert!(completion.wait().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn retry_then_succeed() {
        let (handle, clock, driver, _state_ops, bus) = start(KillServiceConfig {
            kill_chunk_size: 2,
            kill_retry_timeout: Duration::from_secs(10),
            kill_retry_max: Some(3),
        });

        let completion = handle.kill_instances(vec![snapshot("A", "ta")]);
        tokio::task::yield_now().await;
        assert_eq!(driver.call_count(), 1);

        clock.advance(Duration::from_secs(10));
        tokio::time::advance(Duration::from_secs(10)).await;
        tokio::task::yield_now().await;
        assert_eq!(driver.call_count(), 2);

        bus.publish(terminal("A", InstanceCondition::Killed));
        assert!(completion.wait().await.is_ok());
        assert_eq!(driver.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_exhaustion_triggers_force_expunge() {
        let (handle, clock, driver, state_ops, bus) = start(KillServiceConfig {
            kill_chunk_size: 2,
            kill_retry_timeout: Duration::from_secs(10),
            kill_retry_max: Some(2),
        });

        let completion = handle.kill_instances(vec![snapshot("A", "ta")]);
        tokio::task::yield_now().await;
        assert_eq!(driver.call_count(), 1);

        clock.advance(Duration::from_secs(10));
        tokio::time::advance(Duration::from_secs(10)).await;
        tokio::task::yield_now().await;
        assert_eq!(driver.call_count(), 2);
        assert_eq!(state_ops.call_count(), 0);

        clock.advance(Duration::from_secs(10));
        tokio::time::advance(Duration::from_secs(10)).await;
        tokio::task::yield_now().await;
        assert_eq!(state_ops.call_count(), 1);
        assert_eq!(driver.call_count(), 2);

        bus.publish(terminal("A", InstanceCondition::Killed));
        assert!(completion.wait().await.is_ok());
    }

    #[tokio::test]
    async fn lost_instance_force_expunges_without_driver_call() {
        let (handle, _clock, driver, state_ops, bus) = start(KillServiceConfig {
            kill_chunk_size: 2,
            kill_retry_timeout: Duration::from_secs(10),
            kill_retry_max: Some(3),
        });

        let mut lost = snapshot("A", "ta");
        lost.is_unreachable_inactive = true;
        let completion = handle.kill_instances(vec![lost]);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(driver.call_count(), 0);
        assert_eq!(state_ops.call_count(), 1);

        bus.publish(terminal("A", InstanceCondition::Gone));
        assert!(completion.wait().await.is_ok());
    }

    #[tokio::test]
    async fn unknown_task_has_no_completion_and_still_progresses() {
        let (handle, _clock, driver, _state_ops, bus) = start(KillServiceConfig {
            kill_chunk_size: 2,
            kill_retry_timeout: Duration::from_secs(10),
            kill_retry_max: Some(3),
        });

        handle.kill_unknown_task_by_id(TaskId::new(InstanceId::new("A"), "ta"));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(driver.call_count(), 1);

        bus.publish(BusEvent::UnknownInstanceTerminated {
            instance_id: InstanceId::new("A"),
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn resubmission_while_in_flight_resets_attempts_and_redispatches() {
        let (handle, _clock, driver, _state_ops, bus) = start(KillServiceConfig {
            kill_chunk_size: 2,
            kill_retry_timeout: Duration::from_secs(10),
            kill_retry_max: None,
        });

        let _first = handle.kill_instances(vec![snapshot("A", "ta")]);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(driver.call_count(), 1);

        let completion = handle.kill_instances(vec![snapshot("A", "ta2")]);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(driver.call_count(), 2);
        assert_eq!(driver.calls().last().unwrap(), "ta2");

        bus.publish(terminal("A", InstanceCondition::Killed));
        assert!(completion.wait().await.is_ok());
    }

    #[tokio::test]
    async fn duplicate_terminal_events_are_idempotent() {
        let (handle, _clock, _driver, _state_ops, bus) = start(KillServiceConfig {
            kill_chunk_size: 2,
            kill_retry_timeout: Duration::from_secs(10),
            kill_retry_max: Some(3),
        });

        let completion = handle.kill_instances(vec![snapshot("A", "ta")]);
        tokio::time::sleep(Duration::from_millis(20)).await;

        bus.publish(terminal("A", InstanceCondition::Killed));
        bus.publish(terminal("A", InstanceCondition::Killed));
        bus.publish(terminal("A", InstanceCondition::Killed));

        assert!(completion.wait().await.is_ok());
    }
}
