//! This file implements the link protocol engine - ownership, reset and the
//! bounded wait that every handshake step is built on.
//!
//! The byte handshakes themselves are in `write.rs` (compatibility mode,
//! host to device) and `read.rs` (nibble mode, device to host).
//!
//! This is a variant of IEEE1284.  We don't have interrupts hooked up, and
//! the optocouplers on the target are far too slow for the standard's 500ns
//! response times, so every transition is waited for by polling the status
//! lines.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use std::thread::{self, ThreadId};
use std::time::Duration;

use super::driver::{ByteLink, LinkError, WaitStage};
use super::lpt::{Control, LptBus};
use super::status::{Status, Wiring};
use crate::infra::port::RegisterTransport;
use crate::util::time::lpt::{GRACE_PERIOD, SLACK_SLEEP};
use crate::util::time::{Clock, SystemClock, Timing};

/// A link session.  Owns the port, the control mirror, the timing policy and
/// the clock, and is bound to the thread that created it.
///
/// Typical use is [`Link::new`], [`Link::set_control_inversion`],
/// [`Link::reset`], then any number of [`Link::write_byte`] and
/// [`Link::read_byte`] calls.
pub struct Link<T, C = SystemClock> {
    pub(super) bus: LptBus<T>,
    pub(super) clock: C,
    pub(super) timing: Timing,
    owner: ThreadId,
}

impl<T: RegisterTransport> Link<T, SystemClock> {
    /// Create a link on the current thread, calibrating the system clock.
    pub fn new(port: T, wiring: Wiring) -> Self {
        Self::with_clock(port, wiring, SystemClock::calibrate())
    }
}

impl<T: RegisterTransport, C: Clock> Link<T, C> {
    /// Create a link on the current thread using the supplied clock.
    pub fn with_clock(port: T, wiring: Wiring, clock: C) -> Self {
        let owner = thread::current().id();
        debug!("Link created on thread {:?}, wiring {}", owner, wiring);
        Self {
            bus: LptBus::new(port, wiring),
            clock,
            timing: Timing::default(),
            owner,
        }
    }

    /// The current timing policy.
    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    /// Replace the timing policy.  Must not be called mid-transfer, which
    /// the borrow rules ensure.
    pub fn set_timing(&mut self, timing: Timing) -> Result<(), LinkError> {
        self.check_owner()?;
        debug!("Timing set to {:?}", timing);
        self.timing = timing;
        Ok(())
    }

    /// Set which control lines the target's wiring inverts.  Takes effect on
    /// the next control write - normally [`Link::reset`].
    pub fn set_control_inversion(&mut self, mask: u8) -> Result<(), LinkError> {
        self.check_owner()?;
        let inversion = Control::from_bits(mask).ok_or(LinkError::InvalidInversion(mask))?;
        debug!("Control inversion mask {:?}", inversion);
        self.bus.set_inversion(inversion);
        Ok(())
    }

    /// The logical control lines most recently requested.
    pub fn control_mirror(&self) -> Control {
        self.bus.mirror()
    }

    /// The control register value implied by the mirror and inversion mask.
    pub fn hw_control(&self) -> u8 {
        self.bus.hw_control()
    }

    /// The thread this link belongs to.
    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    /// Resets the control register:
    /// - nSTROBE de-asserted (not strobing).  We invert this ourselves, so
    ///   the pin is high.
    /// - nAUTOFEED (HostBusy) de-asserted, pin high.
    /// - Data lines cleared.
    ///
    /// Then waits for the lines to settle.
    pub fn reset(&mut self) -> Result<(), LinkError> {
        self.check_owner()?;
        debug!("Reset, control inversion {:?}", self.bus.inversion());

        self.debug_delay();
        self.bus.reset_control()?;
        self.bus.set_data(0)?;
        self.clock.block_for(self.timing.strobe_delay);

        Ok(())
    }

    /// Poll the status lines once.
    pub fn status(&mut self) -> Result<Status, LinkError> {
        self.check_owner()?;
        Ok(self.bus.status()?)
    }

    /// Waits until all of `high` are set and all of `low` are clear, or the
    /// timeout expires.  A zero timeout waits forever.
    ///
    /// For the first [`GRACE_PERIOD`] we poll flat out to keep handshake
    /// latency down.  After that the device clearly isn't about to respond,
    /// so we sleep for [`SLACK_SLEEP`] between polls rather than burn CPU.
    /// The deadline is checked on every iteration.
    ///
    /// Returns the matching status.
    pub fn wait_for_status(
        &mut self,
        high: Status,
        low: Status,
        timeout: Duration,
        stage: WaitStage,
    ) -> Result<Status, LinkError> {
        self.check_owner()?;
        trace!("Wait for {}", stage);
        let start = self.clock.now();
        let mut slack = false;

        loop {
            let status = self.bus.status()?;
            if status.matches(high, low) {
                trace!("Got {} ({:?})", stage, status);
                return Ok(status);
            }

            let elapsed = self.clock.now().saturating_sub(start);
            if !timeout.is_zero() && elapsed > timeout {
                debug!(
                    "Timed out waiting for {} after {:?}, status {:?}",
                    stage, elapsed, status
                );
                return Err(LinkError::Timeout {
                    stage,
                    waited: elapsed,
                });
            }

            if !slack && elapsed >= GRACE_PERIOD {
                debug!("No {} within {:?}, slowing polling", stage, GRACE_PERIOD);
                slack = true;
            }

            if slack {
                self.clock.sleep(SLACK_SLEEP);
            } else {
                self.clock.relax();
            }
        }
    }

    /// Access the clock.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Access the underlying port.
    pub fn transport(&self) -> &T {
        self.bus.port()
    }

    /// Mutable access to the underlying port.  Writing registers behind the
    /// link's back leaves the control mirror stale until the next reset.
    pub fn transport_mut(&mut self) -> Result<&mut T, LinkError> {
        self.check_owner()?;
        Ok(self.bus.port_mut())
    }

    /// Break the link up, returning the port and clock.
    pub fn into_parts(self) -> (T, C) {
        (self.bus.into_port(), self.clock)
    }

    /// Sleep for the debug delay, if there is one.  Called before every
    /// data and control write.
    #[inline(always)]
    pub(super) fn debug_delay(&self) {
        if !self.timing.debug_delay.is_zero() {
            self.clock.sleep(self.timing.debug_delay);
        }
    }

    /// Release `lines` after a failed handshake step.  The original error is
    /// what the caller reports, so a failure here is only logged.
    pub(super) fn release_after_failure(&mut self, lines: Control) {
        self.debug_delay();
        if let Err(e) = self.bus.release_lines(lines) {
            warn!("Failed to release {:?} after error: {}", lines, e);
        }
    }

    /// Make sure we're being called from the thread that created us.
    pub(super) fn check_owner(&self) -> Result<(), LinkError> {
        let caller = thread::current().id();
        if caller == self.owner {
            Ok(())
        } else {
            error!(
                "Link owned by thread {:?} used from thread {:?}",
                self.owner, caller
            );
            Err(LinkError::WrongThread {
                owner: self.owner,
                caller,
            })
        }
    }
}

impl<T: RegisterTransport, C: Clock> ByteLink for Link<T, C> {
    fn send_byte(&mut self, byte: u8) -> Result<(), LinkError> {
        self.write_byte(byte)
    }

    fn recv_byte(&mut self) -> Result<u8, LinkError> {
        self.read_byte()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{SimClock, SimDevice};

    fn sim_link(device: SimDevice, clock: &SimClock) -> Link<SimDevice, SimClock> {
        Link::with_clock(device, Wiring::Outrun08E, clock.clone())
    }

    #[test]
    fn reset_leaves_default_state_xor_mask_for_every_mask() {
        for mask in 0..=0x0Fu8 {
            let clock = SimClock::new();
            let device = SimDevice::new(&clock, Wiring::Outrun08E, mask);
            let mut link = sim_link(device, &clock);
            link.set_control_inversion(mask).unwrap();
            link.reset().unwrap();

            assert_eq!(link.control_mirror(), Control::empty());
            assert_eq!(link.hw_control(), mask);
            assert_eq!(link.transport().hw_control(), mask);
            assert_eq!(link.transport().data(), 0);
        }
    }

    #[test]
    fn reset_waits_out_settle_delay() {
        let clock = SimClock::new();
        let device = SimDevice::new(&clock, Wiring::Outrun08E, 0);
        let mut link = sim_link(device, &clock);
        link.set_timing(Timing::default().with_strobe_delay_ns(35_000)).unwrap();

        let start = clock.now();
        link.reset().unwrap();
        assert_eq!(clock.now() - start, Duration::from_micros(35));
    }

    #[test]
    fn inversion_wider_than_four_bits_is_rejected() {
        let clock = SimClock::new();
        let device = SimDevice::new(&clock, Wiring::Outrun08E, 0);
        let mut link = sim_link(device, &clock);
        let err = link.set_control_inversion(0x12).unwrap_err();
        assert!(err.is_precondition());
    }

    #[test]
    fn wait_returns_immediately_when_already_matching() {
        let clock = SimClock::new();
        let device = SimDevice::new(&clock, Wiring::Outrun08E, 0);
        let mut link = sim_link(device, &clock);

        let start = clock.now();
        let status = link
            .wait_for_status(
                Status::NOT_BUSY,
                Status::empty(),
                Duration::from_millis(5),
                WaitStage::DeviceReady,
            )
            .unwrap();
        assert!(status.is_ready());
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn wait_polls_tightly_then_sleeps() {
        let clock = SimClock::new();
        let device = SimDevice::new(&clock, Wiring::Outrun08E, 0).with_stuck_busy();
        let mut link = sim_link(device, &clock);

        // Within the grace period, no sleeping.
        let err = link
            .wait_for_status(
                Status::NOT_BUSY,
                Status::empty(),
                Duration::from_millis(20),
                WaitStage::DeviceReady,
            )
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(clock.sleeps(), 0);

        // Beyond it, 10ms sleeps.
        let err = link
            .wait_for_status(
                Status::NOT_BUSY,
                Status::empty(),
                Duration::from_millis(200),
                WaitStage::DeviceReady,
            )
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(clock.sleeps() >= 15);
    }

    #[test]
    fn wait_timeout_is_bounded_by_one_slack_sleep() {
        for timeout_ms in [60u64, 100, 250, 1000] {
            let clock = SimClock::new();
            let device = SimDevice::new(&clock, Wiring::Outrun08E, 0).with_stuck_busy();
            let mut link = sim_link(device, &clock);
            let timeout = Duration::from_millis(timeout_ms);

            let start = clock.now();
            let err = link
                .wait_for_status(
                    Status::NOT_BUSY,
                    Status::empty(),
                    timeout,
                    WaitStage::DeviceReady,
                )
                .unwrap_err();
            let waited = clock.now() - start;

            assert!(waited > timeout, "{waited:?} <= {timeout:?}");
            assert!(waited <= timeout + SLACK_SLEEP, "{waited:?} too long");
            match err {
                LinkError::Timeout { stage, waited: reported } => {
                    assert_eq!(stage, WaitStage::DeviceReady);
                    assert_eq!(reported, waited);
                }
                other => panic!("unexpected error {other}"),
            }
        }
    }

    #[test]
    fn use_from_another_thread_is_rejected() {
        let mut link = Link::new(crate::test::NullPort::default(), Wiring::Direct);
        let owner = link.owner();

        let result = std::thread::spawn(move || link.reset()).join().unwrap();
        match result {
            Err(LinkError::WrongThread { owner: o, caller }) => {
                assert_eq!(o, owner);
                assert_ne!(caller, owner);
            }
            other => panic!("expected WrongThread, got {other:?}"),
        }
    }

    fn assert_wrong_thread<R: std::fmt::Debug>(result: Result<R, LinkError>, owner: ThreadId) {
        match result {
            Err(LinkError::WrongThread { owner: o, caller }) => {
                assert_eq!(o, owner);
                assert_ne!(caller, owner);
            }
            other => panic!("expected WrongThread, got {other:?}"),
        }
    }

    #[test]
    fn every_operation_rejects_another_thread() {
        let mut link = Link::new(crate::test::NullPort::default(), Wiring::Direct);
        let owner = link.owner();

        std::thread::spawn(move || {
            assert_wrong_thread(link.reset(), owner);
            assert_wrong_thread(link.status(), owner);
            assert_wrong_thread(link.set_control_inversion(0x02), owner);
            assert_wrong_thread(link.set_timing(Timing::default()), owner);
            assert_wrong_thread(
                link.wait_for_status(
                    Status::empty(),
                    Status::all(),
                    Duration::from_millis(5),
                    WaitStage::DeviceReady,
                ),
                owner,
            );
            assert_wrong_thread(link.transport_mut().map(|_| ()), owner);
            assert_wrong_thread(link.write_byte(0x00), owner);
            assert_wrong_thread(link.read_byte(), owner);
            assert_wrong_thread(link.send_byte(0x00), owner);
            assert_wrong_thread(link.recv_byte(), owner);

            // Nothing changed.
            assert_eq!(link.timing(), &Timing::default());
            assert!(link.control_mirror().is_empty());
        })
        .join()
        .unwrap();
    }
}
