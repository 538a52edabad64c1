//! Tick clock capability.
//!
//! Drivers measure their period against a free-running `u32` millisecond
//! counter. The counter is allowed to wrap; all elapsed-time arithmetic uses
//! `wrapping_sub`.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// Tick count in milliseconds.
pub type Ticks = u32;

/// Source of the current tick count.
pub trait Clock {
    /// Current tick count. Monotonic modulo `u32` wraparound.
    fn now(&self) -> Ticks;
}

/// Elapsed ticks from `since` to `now`, tolerant of one counter wrap.
#[inline]
pub const fn elapsed(now: Ticks, since: Ticks) -> Ticks {
    now.wrapping_sub(since)
}

/// Wall clock based on `Instant`, counting milliseconds since creation.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    /// Create a clock starting at 0.
    pub fn new() -> Self {
        Self { epoch: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Ticks {
        // Truncation is the wrap.
        self.epoch.elapsed().as_millis() as Ticks
    }
}

/// Manually advanced clock. Clones share the same counter.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Ticks>>,
}

impl ManualClock {
    /// Create a clock reading `start`.
    pub fn starting_at(start: Ticks) -> Self {
        Self { now: Rc::new(Cell::new(start)) }
    }

    /// Set the absolute tick count.
    pub fn set(&self, ticks: Ticks) {
        self.now.set(ticks);
    }

    /// Advance by `delta` ticks, wrapping.
    pub fn advance(&self, delta: Ticks) {
        self.now.set(self.now.get().wrapping_add(delta));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Ticks {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_across_wrap() {
        assert_eq!(elapsed(10, 0), 10);
        assert_eq!(elapsed(5, u32::MAX - 4), 10);
    }

    #[test]
    fn test_manual_clock_clones_share_time() {
        let clock = ManualClock::starting_at(100);
        let other = clock.clone();
        clock.advance(50);
        assert_eq!(other.now(), 150);
        other.set(u32::MAX);
        clock.advance(2);
        assert_eq!(clock.now(), 1);
    }

    #[test]
    fn test_system_clock_starts_near_zero() {
        let clock = SystemClock::new();
        assert!(clock.now() < 1_000);
    }
}
