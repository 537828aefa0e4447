//! Injectable time source for the link timers.
//!
//! Timeouts are wall-clock deltas against a clock passed into the link at
//! construction, never a hidden global. Tests drive a [`SimulatedClock`] to
//! make timer expiry deterministic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Monotonic millisecond time source.
pub trait Clock: Send + Sync {
    /// Current time as monotonic milliseconds.
    fn now_ms(&self) -> u64;
}

/// System clock, anchored at its own creation.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Create a new system clock.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Manually advanced clock for deterministic tests.
///
/// Clones share the same underlying time, so a test can hold one handle
/// while the link under test holds another.
#[derive(Debug, Clone, Default)]
pub struct SimulatedClock {
    now: Arc<AtomicU64>,
}

impl SimulatedClock {
    /// Create a simulated clock starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the clock by `ms` milliseconds.
    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    /// Set the clock to an absolute millisecond count.
    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }
}

impl Clock for SimulatedClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(b >= a);
    }

    #[test]
    fn test_simulated_clock_shares_time_across_clones() {
        let clock = SimulatedClock::new();
        let handle = clock.clone();

        assert_eq!(clock.now_ms(), 0);
        handle.advance(1500);
        assert_eq!(clock.now_ms(), 1500);

        handle.set(10);
        assert_eq!(clock.now_ms(), 10);
    }
}
