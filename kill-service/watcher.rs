use std::collections::HashSet;

use tokio::sync::{broadcast, oneshot};
use tracing::warn;

use crate::events::EventBus;
use crate::types::InstanceId;

/// Returned by [`Completion::wait`] when the caller cancelled the handle
/// before every watched instance was observed terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// The one-shot handle a caller gets back from
/// [`crate::KillServiceHandle::kill_instances`]. It resolves exactly once,
/// after every submitted instance has been observed in a terminal event on
/// the bus (§4.5, invariant 5), and never earlier. A caller may instead
/// [`Completion::cancel`] it, which tears down the underlying subscription
/// without ever resolving — the kill itself still proceeds (§5).
pub struct Completion {
    done: oneshot::Receiver<()>,
    cancel: oneshot::Sender<()>,
}

impl Completion {
    pub async fn wait(self) -> Result<(), Cancelled> {
        // Dropping `cancel` here (implicitly, via self) is harmless: the
        // watcher task already selects on both channels and a dropped
        // cancel sender never fires.
        self.done.await.map_err(|_| Cancelled)
    }

    pub fn cancel(self) {
        let _ = self.cancel.send(());
    }
}

/// Registers a watcher for `ids` against `bus` (C6). The subscription is
/// created synchronously, before this function returns, so that a
/// terminal event published immediately after registration (e.g. by the
/// caller's own kill issuance) can never be missed (§4.5).
pub fn register(ids: HashSet<InstanceId>, bus: &EventBus) -> Completion {
    let receiver = bus.subscribe();
    let (done_tx, done_rx) = oneshot::channel();
    let (cancel_tx, cancel_rx) = oneshot::channel();

    tokio::spawn(watch(ids, receiver, done_tx, cancel_rx));

    Completion {
        done: done_rx,
        cancel: cancel_tx,
    }
}

async fn watch(
    mut remaining: HashSet<InstanceId>,
    mut events: broadcast::Receiver<crate::events::BusEvent>,
    done: oneshot::Sender<()>,
    mut cancel: oneshot::Receiver<()>,
) {
    if remaining.is_empty() {
        let _ = done.send(());
        return;
    }

    loop {
        tokio::select! {
            biased;
            _ = &mut cancel => return,
            event = events.recv() => {
                match event {
                    | Ok(event) => {
                        if let Some(id) = event.terminal_instance_id() {
                            remaining.remove(id);
                        }
                    }
                    | Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "kill watcher lagged behind the event bus");
                    }
                    | Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        }

        if remaining.is_empty() {
            let _ = done.send(());
            return;
        }
    }
}
