use tokio::sync::broadcast;

use crate::types::InstanceId;

/// The classification of an instance's lifecycle condition the wider system
/// reports over the event bus. Only a subset is terminal; see
/// [`InstanceCondition::is_terminal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceCondition {
    Staging,
    Running,
    Finished,
    Failed,
    Killed,
    Error,
    Gone,
    Dropped,
    /// `final` distinguishes a confirmed-permanent unreachability from a
    /// transient one the instance might still recover from.
    Unreachable { final_: bool },
    Unknown,
}

impl InstanceCondition {
    /// §4.3: the union of conditions the surrounding system treats as
    /// terminal for expungement purposes. Implementations MUST keep this in
    /// sync with that classification.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            | InstanceCondition::Finished
                | InstanceCondition::Failed
                | InstanceCondition::Killed
                | InstanceCondition::Error
                | InstanceCondition::Gone
                | InstanceCondition::Dropped
                | InstanceCondition::Unknown
        ) || matches!(self, InstanceCondition::Unreachable { final_: true })
    }
}

/// The two event kinds the core subscribes to (§4.3), plus whatever other
/// traffic the wider event pipeline carries that the core simply ignores.
#[derive(Debug, Clone)]
pub enum BusEvent {
    InstanceChanged {
        instance_id: InstanceId,
        condition: InstanceCondition,
    },
    UnknownInstanceTerminated {
        instance_id: InstanceId,
    },
}

impl BusEvent {
    pub(crate) fn terminal_instance_id(&self) -> Option<&InstanceId> {
        match self {
            | BusEvent::InstanceChanged {
                instance_id,
                condition,
            } if condition.is_terminal() => Some(instance_id),
            | BusEvent::UnknownInstanceTerminated { instance_id } => Some(instance_id),
            | BusEvent::InstanceChanged { .. } => None,
        }
    }
}

/// A shared publish/subscribe capability. Every subscriber — the core's own
/// terminal-event listener and every per-request [`crate::watcher`] — gets
/// its own independent `broadcast::Receiver`, matching §9's "polymorphic
/// subscribe over the capability set {deliver-to-me, unsubscribe}".
pub struct EventBus {
    sender: broadcast::Sender<BusEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: BusEvent) {
        // No active subscribers is not an error; the event is simply unheard.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
