use std::time::Instant;

use derive_more::Display;

/// Opaque, equality-comparable identifier for an instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub struct InstanceId(String);

impl InstanceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl From<String> for InstanceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Opaque identifier for a task. Carries both the id the orchestrator knows
/// it by and the id the driver understands (`driver_task_id`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display)]
#[display(fmt = "{instance_id}/{driver_task_id}")]
pub struct TaskId {
    pub instance_id: InstanceId,
    pub driver_task_id: String,
}

impl TaskId {
    pub fn new(instance_id: InstanceId, driver_task_id: impl Into<String>) -> Self {
        Self {
            instance_id,
            driver_task_id: driver_task_id.into(),
        }
    }
}

/// A read-only snapshot of a single task, as captured at submission time.
#[derive(Debug, Clone)]
pub struct TaskSnapshot {
    pub task_id: TaskId,
    pub is_terminal: bool,
}

/// A read-only snapshot of an instance, supplied by the caller. The core
/// never queries live instance state itself — callers hand it whatever they
/// last observed.
#[derive(Debug, Clone)]
pub struct InstanceSnapshot {
    pub instance_id: InstanceId,
    pub tasks: Vec<TaskSnapshot>,
    pub is_gone: bool,
    pub is_unknown: bool,
    pub is_dropped: bool,
    pub is_unreachable: bool,
    pub is_unreachable_inactive: bool,
}

impl InstanceSnapshot {
    /// §4.2 step 1: true if the cluster has lost contact with this instance
    /// such that a driver-mediated kill can never make progress.
    pub fn is_lost(&self) -> bool {
        self.is_gone
            || self.is_unknown
            || self.is_dropped
            || self.is_unreachable
            || self.is_unreachable_inactive
    }

    /// The non-terminal tasks captured at submission time (§4.1 step 2).
    pub fn live_task_ids(&self) -> Vec<TaskId> {
        self.tasks
            .iter()
            .filter(|t| !t.is_terminal)
            .map(|t| t.task_id.clone())
            .collect()
    }
}

/// A single instance the core is driving to termination. See spec.md §3 for
/// the field-by-field invariants.
///
/// `issued_at` models spec.md's "zero-value means never issued" as `None` —
/// idiomatic Rust has no natural zero value for a monotonic instant, and
/// `Option` makes "never issued" a type-level fact instead of a sentinel a
/// reader has to know about.
#[derive(Debug, Clone)]
pub struct ToKill {
    pub instance_id: InstanceId,
    pub task_ids: Vec<TaskId>,
    pub instance: Option<InstanceSnapshot>,
    pub attempts: u32,
    pub issued_at: Option<Instant>,
}

impl ToKill {
    pub fn from_submission(instance: InstanceSnapshot) -> Self {
        Self {
            instance_id: instance.instance_id.clone(),
            task_ids: instance.live_task_ids(),
            instance: Some(instance),
            attempts: 0,
            issued_at: None,
        }
    }

    pub fn from_unknown_task(task_id: TaskId) -> Self {
        Self {
            instance_id: task_id.instance_id.clone(),
            task_ids: vec![task_id],
            instance: None,
            attempts: 0,
            issued_at: None,
        }
    }

    pub fn is_lost(&self) -> bool {
        self.instance.as_ref().is_some_and(InstanceSnapshot::is_lost)
    }

    pub fn all_terminal(&self) -> bool {
        self.task_ids.is_empty()
    }
}
