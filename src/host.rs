//! Host boundary types.
//!
//! The interpreter never touches wall clocks or sockets directly. The host
//! supplies a `Clock` at construction (tests supply a manual one), reports
//! I/O readiness through `IoEvent`s, and owns every socket behind an opaque
//! `HostHandle` that the snapshot encoder refuses to follow.

use std::time::Instant;

/// Monotonic clock in milliseconds. Interpreter-scoped so tests can run many
/// interpreters against independent clocks.
pub trait Clock {
    fn now_ms(&self) -> f64;
}

/// Real clock: milliseconds since construction.
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64() * 1000.0
    }
}

/// Manually advanced clock for tests and deterministic replays.
#[derive(Default)]
pub struct ManualClock {
    now: std::cell::Cell<f64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ms: f64) {
        self.now.set(self.now.get() + ms);
    }

    pub fn set(&self, ms: f64) {
        self.now.set(ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.now.get()
    }
}

// Tests hold the clock while the interpreter owns a boxed handle to it.
impl Clock for std::rc::Rc<ManualClock> {
    fn now_ms(&self) -> f64 {
        self.as_ref().now_ms()
    }
}

/// Opaque identifier for a host-owned resource (socket, listener). Only ever
/// compared and stored; the host maps it back to the real resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostHandle(pub u64);

/// I/O readiness report from the host event loop. Threads blocked on the
/// handle are unblocked in the order these are delivered.
#[derive(Debug, Clone, Copy)]
pub struct IoEvent {
    pub handle: HostHandle,
}
