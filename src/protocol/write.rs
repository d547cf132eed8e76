//! This file implements sending bytes to the device, in compatibility mode.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use super::driver::{LinkError, WaitStage};
use super::link::Link;
use super::lpt::Control;
use super::status::Status;
use crate::infra::port::RegisterTransport;
use crate::util::time::Clock;

impl<T: RegisterTransport, C: Clock> Link<T, C> {
    /// Writes a single byte in compatibility mode.
    ///
    /// Implements the following steps:
    /// - Waits for BUSY low - the device can take a byte.
    /// - Puts the byte on the data lines.
    /// - Waits the strobe delay.  The device has to see stable data before
    ///   it is strobed, and the optocouplers take tens of microseconds.
    /// - Asserts nSTROBE.
    /// - Waits for BUSY high - the device has the byte.
    /// - De-asserts nSTROBE.
    ///
    /// Both waits use the transmit timeout.  The nACK transition that
    /// follows is ignored; once BUSY has cycled the byte is considered
    /// delivered.
    ///
    /// Returns
    /// - Ok(()) - byte sent and acknowledged
    /// - Err(LinkError::Timeout) - the device didn't respond.  If it was the
    ///   acknowledge that timed out, nSTROBE is released before returning.
    pub fn write_byte(&mut self, byte: u8) -> Result<(), LinkError> {
        self.check_owner()?;
        let timeout = self.timing.tx_timeout;

        // Wait for BUSY to be low (indicates the device can receive data).
        self.wait_for_status(
            Status::NOT_BUSY,
            Status::empty(),
            timeout,
            WaitStage::DeviceReady,
        )?;

        // Device not busy - set data on the output pins.
        self.debug_delay();
        self.bus.set_data(byte)?;

        // Wait before we strobe, or the data might be read wrong.
        self.clock.block_for(self.timing.strobe_delay);

        // Pull the strobe line low.
        self.debug_delay();
        self.bus.set_lines(Control::STROBE)?;

        // Wait for BUSY high.
        if let Err(e) = self.wait_for_status(
            Status::empty(),
            Status::NOT_BUSY,
            timeout,
            WaitStage::StrobeAck,
        ) {
            trace!("No acknowledge for byte 0x{:02x}, releasing strobe", byte);
            self.release_after_failure(Control::STROBE);
            return Err(e);
        }

        // Set the strobe line back to high.
        self.debug_delay();
        self.bus.release_lines(Control::STROBE)?;

        // Ignore the nACK transition, since we're not sending anything back
        // anyway.
        trace!("Sent 0x{:02x}", byte);
        Ok(())
    }
}
