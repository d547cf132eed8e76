//! Various test objects for orboot.
//!
//! [`SimClock`] is a virtual clock: time only moves when the link relaxes,
//! sleeps or blocks, so timeout behaviour can be tested exactly and
//! instantly.  [`SimDevice`] is an emulated target on the other end of the
//! cable, driven by the same clock.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use std::cell::Cell;
use std::io;
use std::rc::Rc;
use std::time::Duration;

use crate::infra::port::RegisterTransport;
use crate::util::time::Clock;


pub use device::SimDevice;

/// How far time moves on each tight poll, by default.
pub const DEFAULT_TICK: Duration = Duration::from_micros(1);

/// A simulated clock.  Clones share the same time, so the link and the
/// emulated device can each hold one.
#[derive(Debug, Clone)]
pub struct SimClock {
    now: Rc<Cell<Duration>>,
    sleeps: Rc<Cell<u32>>,
    tick: Duration,
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SimClock {
    #[must_use]
    pub fn new() -> Self {
        Self::with_tick(DEFAULT_TICK)
    }

    /// A clock which moves `tick` for every tight poll.
    #[must_use]
    pub fn with_tick(tick: Duration) -> Self {
        Self {
            now: Rc::new(Cell::new(Duration::ZERO)),
            sleeps: Rc::new(Cell::new(0)),
            tick,
        }
    }

    /// Move time forward without anyone sleeping.
    pub fn advance(&self, duration: Duration) {
        self.now.set(self.now.get() + duration);
    }

    /// Number of times anything has slept on this clock.
    pub fn sleeps(&self) -> u32 {
        self.sleeps.get()
    }
}

impl Clock for SimClock {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.set(self.sleeps.get() + 1);
        self.advance(duration);
    }

    fn relax(&self) {
        self.advance(self.tick);
    }

    fn block_for(&self, duration: Duration) {
        self.advance(duration);
    }
}

/// A port with nothing attached.  Writes are kept, status reads as all
/// lines low.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPort {
    pub data: u8,
    pub control: u8,
}

impl RegisterTransport for NullPort {
    fn set_data(&mut self, data: u8) -> io::Result<()> {
        self.data = data;
        Ok(())
    }

    fn set_control(&mut self, control: u8) -> io::Result<()> {
        self.control = control;
        Ok(())
    }

    fn control(&mut self) -> io::Result<u8> {
        Ok(self.control)
    }

    fn status(&mut self) -> io::Result<u8> {
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_time() {
        let a = SimClock::new();
        let b = a.clone();
        a.relax();
        b.block_for(Duration::from_micros(9));
        assert_eq!(a.now(), Duration::from_micros(10));
        assert_eq!(b.now(), a.now());
    }

    #[test]
    fn sleeps_are_counted() {
        let clock = SimClock::new();
        clock.block_for(Duration::from_millis(1));
        clock.sleep(Duration::from_millis(10));
        clock.sleep(Duration::from_millis(10));
        assert_eq!(clock.sleeps(), 2);
        assert_eq!(clock.now(), Duration::from_millis(21));
    }
}
