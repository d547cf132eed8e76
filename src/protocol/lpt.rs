//! This file implements the LPT bus - the control register mirror, the
//! control line inversion mask, and decoded status reads.
//!
//! | Name        | Register:Bit | Pin  | Dir | Wr. Inv | Rd. Inv |
//! |-------------|--------------|------|-----|---------|---------|
//! | nERROR      | STATUS:3     | 15   | R   | -       | No      |
//! | SELECT      | STATUS:4     | 13   | R   | -       | No      |
//! | PAPER OUT   | STATUS:5     | 12   | R   | -       | No      |
//! | nACK        | STATUS:6     | 10   | R   | -       | No      |
//! | BUSY        | STATUS:7     | 11   | R   | -       | Yes     |
//! | DATA0-7     | DATA:0-7     | 2-9  | W   | No      | -       |
//! | nSTROBE     | CONTROL:0    | 1    | R/W | Yes     | ?       |
//! | nAUTOFEED   | CONTROL:1    | 14   | R/W | Yes     | ?       |
//! | nINITIALIZE | CONTROL:2    | 16   | R/W | No      | ?       |
//! | nSELECT IN  | CONTROL:3    | 17   | R/W | Yes     | ?       |
//!
//! Write inversion is as measured on the DB25 pins.  The board may invert
//! lines again, which is what the inversion mask is for.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use bitflags::bitflags;
use std::io;

use super::status::{Status, Wiring};
use crate::constants::CONTROL_REG_MASK;
use crate::infra::port::RegisterTransport;

bitflags! {
    /// Logical control lines.  A set bit asserts the line, which for the
    /// three register-inverted lines means driving the pin low.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Control: u8 {
        /// nSTROBE - data valid.
        const STROBE = 1 << 0;
        /// nAUTOFEED - HostBusy in nibble mode.  Asserted (low) means the
        /// host is ready for a nibble.
        const AUTO_FEED = 1 << 1;
        /// nINITIALIZE.  Not register-inverted.
        const INITIALIZE = 1 << 2;
        /// nSELECT IN.
        const SELECT_IN = 1 << 3;
    }
}

/// The LPT bus.  Keeps a mirror of the logical control lines, because the
/// hardware value also has the inversion mask applied on top.
///
/// The value written to the control register is always
/// `mirror ^ inversion`.
pub struct LptBus<T> {
    port: T,
    wiring: Wiring,
    mirror: Control,
    inversion: Control,
}

impl<T: RegisterTransport> LptBus<T> {
    /// Create a new bus.  Nothing is written to the port until the control
    /// lines are first changed.
    pub fn new(port: T, wiring: Wiring) -> Self {
        Self {
            port,
            wiring,
            mirror: Control::empty(),
            inversion: Control::empty(),
        }
    }

    /// The status line wiring in use.
    pub fn wiring(&self) -> Wiring {
        self.wiring
    }

    /// The logical control lines most recently requested.
    pub fn mirror(&self) -> Control {
        self.mirror
    }

    /// The control lines inverted by the target's wiring.
    pub fn inversion(&self) -> Control {
        self.inversion
    }

    /// Set which control lines are inverted.  Does not touch the hardware.
    pub fn set_inversion(&mut self, inversion: Control) {
        self.inversion = inversion;
    }

    /// The value the control register holds (or will, once written).
    #[inline(always)]
    pub fn hw_control(&self) -> u8 {
        (self.mirror ^ self.inversion).bits() & CONTROL_REG_MASK
    }

    /// Return all control lines to their default, de-asserted, state.
    pub fn reset_control(&mut self) -> io::Result<()> {
        self.mirror = Control::empty();
        self.write_control()
    }

    /// Assert `lines`, leaving the others as they are.
    #[inline(always)]
    pub fn set_lines(&mut self, lines: Control) -> io::Result<()> {
        self.mirror |= lines;
        self.write_control()
    }

    /// De-assert `lines`, leaving the others as they are.
    #[inline(always)]
    pub fn release_lines(&mut self, lines: Control) -> io::Result<()> {
        self.mirror &= !lines;
        self.write_control()
    }

    /// Drive the data lines.
    #[inline(always)]
    pub fn set_data(&mut self, data: u8) -> io::Result<()> {
        trace!("Data 0x{:02x}", data);
        self.port.set_data(data)
    }

    /// Read and decode the status lines.
    #[inline(always)]
    pub fn status(&mut self) -> io::Result<Status> {
        let raw = self.port.status()?;
        Ok(self.wiring.decode(raw))
    }

    /// Read the control register back from the hardware.
    pub fn read_hw_control(&mut self) -> io::Result<u8> {
        self.port.control()
    }

    /// Access the underlying port.
    pub fn port(&self) -> &T {
        &self.port
    }

    /// Mutable access to the underlying port.
    pub fn port_mut(&mut self) -> &mut T {
        &mut self.port
    }

    /// Retrieve the underlying port.
    pub fn into_port(self) -> T {
        self.port
    }

    fn write_control(&mut self) -> io::Result<()> {
        let hw = self.hw_control();
        trace!("Control {:?} -> 0x{:x}", self.mirror, hw);
        self.port.set_control(hw)
    }
}
