//! The instance kill-service core: a bounded, retrying, event-driven state
//! machine that drives a set of instances to a terminal state.
//!
//! Everything this crate talks to — the scheduler driver, the authoritative
//! state store, the wider event pipeline — is represented purely as a trait
//! boundary ([`driver::DriverHandle`], [`state_ops::StateOpProcessor`],
//! [`events::EventBus`]). This crate owns none of them.

mod clock;
mod core;
mod driver;
mod error;
mod events;
mod retry;
mod state_ops;
mod types;
mod watcher;

#[cfg(test)]
mod testutil;

pub use clock::{Clock, SystemClock};
pub use core::{KillServiceConfig, KillServiceCore, KillServiceHandle};
pub use driver::DriverHandle;
pub use error::KillServiceError;
pub use events::{BusEvent, EventBus, InstanceCondition};
pub use state_ops::StateOpProcessor;
pub use types::{InstanceId, InstanceSnapshot, TaskId, TaskSnapshot, ToKill};
pub use watcher::{Cancelled, Completion};
