use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::clock::Clock;
use crate::driver::DriverHandle;
use crate::state_ops::StateOpProcessor;
use crate::types::InstanceId;

/// A settable clock (§9 "tests use a controllable settable clock"). Starts
/// at `Instant::now()` at construction and only moves forward via
/// [`FakeClock::advance`].
#[derive(Clone)]
pub struct FakeClock {
    inner: Arc<Mutex<Instant>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.inner.lock().unwrap();
        *guard += by;
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        *self.inner.lock().unwrap()
    }
}

/// Records every `kill_task` call it receives; never fails unless told to.
#[derive(Clone, Default)]
pub struct RecordingDriver {
    calls: Arc<Mutex<Vec<String>>>,
    fail: Arc<Mutex<bool>>,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl DriverHandle for RecordingDriver {
    async fn kill_task(&self, driver_task_id: &str) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(driver_task_id.to_string());
        if *self.fail.lock().unwrap() {
            anyhow::bail!("simulated driver failure");
        }
        Ok(())
    }
}

/// Records every `force_expunge` call it receives.
#[derive(Clone, Default)]
pub struct RecordingStateOps {
    calls: Arc<Mutex<Vec<InstanceId>>>,
}

impl RecordingStateOps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<InstanceId> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl StateOpProcessor for RecordingStateOps {
    async fn force_expunge(&self, instance_id: &InstanceId) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(instance_id.clone());
        Ok(())
    }
}
