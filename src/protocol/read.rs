//! This file implements receiving bytes from the device, in nibble mode.
//!
//! In nibble mode the device presents 4 bits at a time on the status lines,
//! handshaking with PtrClk (nACK), while the host handshakes with HostBusy
//! (nAUTOFEED).

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
use crate::util::time::lpt::NIBBLE_SETTLE;

impl<T: RegisterTransport, C: Clock> Link<T, C> {
    /// Reads a single byte, as two nibbles - low nibble first.
    ///
    /// If either nibble times out the whole byte fails, with HostBusy left
    /// de-asserted.  There is no acknowledge checking on receive - the
    /// HostBusy/PtrClk handshake is all there is.
    pub fn read_byte(&mut self) -> Result<u8, LinkError> {
        self.check_owner()?;

        let low = self.read_nibble()?;
        let high = self.read_nibble()?;

        let byte = (high << 4) | low;
        trace!("Received 0x{:02x}", byte);
        Ok(byte)
    }

    // Reads a nibble.  Both waits use the receive timeout, and either
    // timing out leaves HostBusy de-asserted.
    fn read_nibble(&mut self) -> Result<u8, LinkError> {
        let timeout = self.timing.rx_timeout;

        // Set HostBusy (nAUTOFEED) low - we are ready to receive.
        self.debug_delay();
        self.bus.set_lines(Control::AUTO_FEED)?;

        // Device puts the nibble on the status lines, then pulls PtrClk
        // (nACK) low.
        if let Err(e) = self.wait_for_status(
            Status::empty(),
            Status::N_ACK,
            timeout,
            WaitStage::NibbleReady,
        ) {
            trace!("No nibble from device, releasing HostBusy");
            self.release_after_failure(Control::AUTO_FEED);
            return Err(e);
        }

        // Wait a bit and read the status lines again, in case they were
        // still being set.
        self.clock.block_for(NIBBLE_SETTLE);
        let nibble = self.bus.status()?.nibble();

        // Set HostBusy high.
        self.debug_delay();
        self.bus.release_lines(Control::AUTO_FEED)?;

        // Wait for PtrClk to go high again.
        self.wait_for_status(
            Status::N_ACK,
            Status::empty(),
            timeout,
            WaitStage::NibbleDone,
        )?;

        Ok(nibble)
    }
}
