//! Wall-clock abstraction for the realtime mode.
//!
//! The scheduler's realtime frames advance the virtual clock to whatever a
//! `TimeSource` reports, so tests can swap the wall clock for a simulated one
//! and step it explicitly.

use std::cell::Cell;
use std::rc::Rc;

use tokio::time::Instant;

/// Abstraction over elapsed wall-clock time.
pub trait TimeSource {
    /// Milliseconds elapsed since this source's origin.
    fn now_ms(&self) -> u64;
}

impl<S: TimeSource + ?Sized> TimeSource for Rc<S> {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

/// Real time source measuring from the moment it was created.
///
/// Built on tokio's `Instant`, so paused test runtimes control it too.
#[derive(Debug, Clone, Copy)]
pub struct SystemTimeSource {
    origin: Instant,
}

impl SystemTimeSource {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemTimeSource {
    // Milliseconds fit in u64 for billions of years.
    #[allow(clippy::cast_possible_truncation)]
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// A time source that only moves when told to.
///
/// Uses [`Cell`] for interior mutability, so it is single-threaded only,
/// like the scheduler itself.
///
/// # Example
///
/// ```
/// use marbles::time_source::{SimulatedTimeSource, TimeSource};
///
/// let time = SimulatedTimeSource::new(0);
/// time.advance(16);
/// assert_eq!(time.now_ms(), 16);
/// ```
#[derive(Debug, Default)]
pub struct SimulatedTimeSource {
    current_ms: Cell<u64>,
}

impl SimulatedTimeSource {
    #[must_use]
    pub const fn new(initial_ms: u64) -> Self {
        Self {
            current_ms: Cell::new(initial_ms),
        }
    }

    /// Advance time by the given number of milliseconds, saturating at `u64::MAX`.
    pub fn advance(&self, ms: u64) {
        self.current_ms.set(self.current_ms.get().saturating_add(ms));
    }

    /// Set the current time. May move backwards; the scheduler's clock won't.
    pub fn set(&self, ms: u64) {
        self.current_ms.set(ms);
    }

    #[must_use]
    pub fn current(&self) -> u64 {
        self.current_ms.get()
    }
}

impl TimeSource for SimulatedTimeSource {
    fn now_ms(&self) -> u64 {
        self.current_ms.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_simulated_time_initial() {
        let time = SimulatedTimeSource::new(1000);
        assert_eq!(time.now_ms(), 1000);
        assert_eq!(time.current(), 1000);
    }

    #[test]
    fn test_simulated_time_advance_and_set() {
        let time = SimulatedTimeSource::default();
        time.advance(100);
        time.advance(50);
        assert_eq!(time.now_ms(), 150);

        time.set(10);
        assert_eq!(time.now_ms(), 10);
    }

    #[test]
    fn test_simulated_time_saturates() {
        let time = SimulatedTimeSource::new(u64::MAX - 5);
        time.advance(10);
        assert_eq!(time.now_ms(), u64::MAX);
    }

    #[test]
    fn test_shared_source_through_rc() {
        let time = Rc::new(SimulatedTimeSource::new(0));
        #[allow(clippy::disallowed_methods)]
        let shared: Box<dyn TimeSource> = Box::new(Rc::clone(&time));

        time.advance(42);
        assert_eq!(shared.now_ms(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_system_time_follows_tokio_clock() {
        let source = SystemTimeSource::new();
        assert_eq!(source.now_ms(), 0);

        tokio::time::advance(Duration::from_millis(250)).await;
        assert_eq!(source.now_ms(), 250);
    }
}
