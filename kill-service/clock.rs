use std::time::Instant;

/// Injectable monotonic-ish timestamp source (C1). Production code uses
/// [`SystemClock`]; tests substitute a settable fake (see `testutil`).
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
