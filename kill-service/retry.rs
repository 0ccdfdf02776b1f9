use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// A rearmable interval ticker (C2). Disarmed by default; the core arms it
/// whenever the in-flight table is non-empty and disarms it once drained
/// (§4.4), rather than ticking unconditionally the whole process lifetime.
pub struct RetryTimer {
    period: Duration,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl RetryTimer {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            handle: Mutex::new(None),
        }
    }

    /// Starts ticking into `tick_tx` if not already armed. A no-op while
    /// already armed, so callers can call this unconditionally on every
    /// dispatch pass.
    pub async fn arm(self: &Arc<Self>, tick_tx: mpsc::UnboundedSender<()>) {
        let mut guard = self.handle.lock().await;
        if guard.is_some() {
            return;
        }
        let period = self.period;
        *guard = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await; // first tick fires immediately; consume it
            loop {
                interval.tick().await;
                if tick_tx.send(()).is_err() {
                    return;
                }
            }
        }));
    }

    /// Stops ticking. A no-op if already disarmed.
    pub async fn disarm(&self) {
        if let Some(handle) = self.handle.lock().await.take() {
            handle.abort();
        }
    }

    #[cfg(test)]
    pub async fn is_armed(&self) -> bool {
        self.handle.lock().await.is_some()
    }
}
