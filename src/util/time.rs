//! This file implements the timing primitives used by the link.
//!
//! All of the link's notion of time goes through the [`Clock`] trait, so that
//! the busy-waits and sleeps can be driven by a simulated clock in tests
//! instead of real wall-clock time.  [`SystemClock`] is the real thing,
//! backed by the most precise monotonic timer the OS gives us.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use std::time::{Duration, Instant};

use crate::constants::{
    DEFAULT_DEBUG_DELAY_MS, DEFAULT_RX_TIMEOUT_MS, DEFAULT_STROBE_DELAY_NS,
};

/// A monotonic time source, plus the ways the link is allowed to pass time.
pub trait Clock {
    /// Time elapsed since this clock's epoch.
    fn now(&self) -> Duration;

    /// Give up the CPU for at least `duration`.  Used once a wait has
    /// exceeded its grace period, and for debug delays.
    fn sleep(&self, duration: Duration);

    /// Called once per iteration of a tight polling loop.
    #[inline(always)]
    fn relax(&self) {
        std::hint::spin_loop();
    }

    /// Busy wait for at least `duration`, without giving up the CPU.  This
    /// is used for settle delays, which are far too short to sleep for.
    fn block_for(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        let expires = self.now() + duration;
        while self.now() < expires {
            self.relax();
        }
    }
}

/// The real clock, based on [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    epoch: Instant,
    resolution: Duration,
}

impl SystemClock {
    /// Create the clock, measuring the smallest step the underlying timer
    /// can actually resolve.  Settle delays shorter than this will take at
    /// least this long.
    pub fn calibrate() -> Self {
        let epoch = Instant::now();

        let mut resolution = Duration::MAX;
        for _ in 0..lpt::CALIBRATION_SAMPLES {
            let start = Instant::now();
            let mut next = Instant::now();
            while next == start {
                next = Instant::now();
            }
            resolution = resolution.min(next - start);
        }

        debug!("Calibrated monotonic clock, resolution {:?}", resolution);
        Self { epoch, resolution }
    }

    /// The measured timer resolution.
    pub fn resolution(&self) -> Duration {
        self.resolution
    }
}

impl Clock for SystemClock {
    #[inline(always)]
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Timing policy for the link.
///
/// A zero timeout means wait forever.  These may be changed between
/// transfers, but not during one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Time data (and control lines) must be stable for before the device
    /// can rely on them.  Dominated by optocoupler propagation delay.
    pub strobe_delay: Duration,

    /// Extra delay before every data or control write, to slow the link
    /// down enough to watch on a scope.  Zero disables it.
    pub debug_delay: Duration,

    /// Timeout for each nibble mode handshake step.
    pub rx_timeout: Duration,

    /// Timeout for each compatibility mode handshake step.
    pub tx_timeout: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            strobe_delay: Duration::from_nanos(DEFAULT_STROBE_DELAY_NS),
            debug_delay: Duration::from_millis(DEFAULT_DEBUG_DELAY_MS.into()),
            rx_timeout: Duration::from_millis(DEFAULT_RX_TIMEOUT_MS.into()),
            tx_timeout: Duration::ZERO,
        }
    }
}

impl Timing {
    /// Builder style setter for the strobe delay, in nanoseconds.
    pub fn with_strobe_delay_ns(mut self, ns: u64) -> Self {
        self.strobe_delay = Duration::from_nanos(ns);
        self
    }

    /// Builder style setter for the debug delay, in milliseconds.
    pub fn with_debug_delay_ms(mut self, ms: u32) -> Self {
        self.debug_delay = Duration::from_millis(ms.into());
        self
    }

    /// Builder style setter for the receive timeout, in milliseconds.
    pub fn with_rx_timeout_ms(mut self, ms: u32) -> Self {
        self.rx_timeout = Duration::from_millis(ms.into());
        self
    }

    /// Builder style setter for the transmit timeout, in milliseconds.
    pub fn with_tx_timeout_ms(mut self, ms: u32) -> Self {
        self.tx_timeout = Duration::from_millis(ms.into());
        self
    }
}

pub mod lpt {
    //! Link handshake timers

    use std::time::Duration;

    /// How long a wait polls flat out before it decides the device isn't
    /// about to respond, and starts sleeping between polls.  A healthy link
    /// responds in well under a millisecond.
    pub const GRACE_PERIOD: Duration = Duration::from_millis(50);

    /// How long to sleep between polls once past the grace period.
    pub const SLACK_SLEEP: Duration = Duration::from_millis(10);

    /// Delay between seeing PtrClk go low and sampling the nibble, in case
    /// the device is still setting the status lines.
    pub const NIBBLE_SETTLE: Duration = Duration::from_nanos(10);

    /// Number of timer ticks observed when calibrating the clock.
    pub const CALIBRATION_SAMPLES: usize = 16;
}
