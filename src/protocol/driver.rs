//! This file defines the link's error type and the [`ByteLink`] trait, which
//! is what the bootloader framing is built on.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use std::fmt;
use std::thread::ThreadId;
use std::time::Duration;

/// The handshake step a wait was for.  Carried in timeouts so the caller can
/// report where the link stalled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStage {
    /// Compatibility mode - BUSY low before placing a byte.
    DeviceReady,
    /// Compatibility mode - BUSY high after strobing.
    StrobeAck,
    /// Nibble mode - PtrClk low, nibble available.
    NibbleReady,
    /// Nibble mode - PtrClk high again, device finished the nibble.
    NibbleDone,
}

impl fmt::Display for WaitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitStage::DeviceReady => write!(f, "device ready (BUSY low)"),
            WaitStage::StrobeAck => write!(f, "strobe acknowledge (BUSY high)"),
            WaitStage::NibbleReady => write!(f, "nibble ready (PtrClk low)"),
            WaitStage::NibbleDone => write!(f, "nibble done (PtrClk high)"),
        }
    }
}

/// Defines errors for the link and everything built on it.
///
/// There are two kinds of failure: timeouts, which are a fact of life on a
/// physical link and abort the current transfer, and precondition
/// violations, which mean the caller misused the link.  Transport errors
/// come from the register access itself.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// The device didn't respond in time.
    #[error("timed out after {waited:?} waiting for {stage}")]
    Timeout { stage: WaitStage, waited: Duration },

    /// The link was used from a thread other than the one that created it.
    #[error("link owned by thread {owner:?} used from thread {caller:?}")]
    WrongThread { owner: ThreadId, caller: ThreadId },

    /// An upload was larger than the target's memory.
    #[error("payload of {len} bytes exceeds maximum of {max} bytes")]
    PayloadTooLarge { len: usize, max: usize },

    /// An inversion mask wider than the 4 control lines.
    #[error("control inversion mask 0x{0:02x} is wider than 4 bits")]
    InvalidInversion(u8),

    /// Reading or writing a register failed.
    #[error("register access failed: {0}")]
    Transport(#[from] std::io::Error),
}

impl LinkError {
    /// True if this is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, LinkError::Timeout { .. })
    }

    /// True if the caller misused the link.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            LinkError::WrongThread { .. }
                | LinkError::PayloadTooLarge { .. }
                | LinkError::InvalidInversion(_)
        )
    }
}

/// A byte-at-a-time, half-duplex link to the target.
///
/// Neither operation retries: on error the caller is expected to abandon
/// the whole transfer.
pub trait ByteLink {
    /// Send a single byte to the device.
    fn send_byte(&mut self, byte: u8) -> Result<(), LinkError>;

    /// Receive a single byte from the device.  No partial byte is ever
    /// returned.
    fn recv_byte(&mut self) -> Result<u8, LinkError>;
}

impl<L: ByteLink + ?Sized> ByteLink for &mut L {
    fn send_byte(&mut self, byte: u8) -> Result<(), LinkError> {
        (**self).send_byte(byte)
    }

    fn recv_byte(&mut self) -> Result<u8, LinkError> {
        (**self).recv_byte()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        let timeout = LinkError::Timeout {
            stage: WaitStage::StrobeAck,
            waited: Duration::from_millis(110),
        };
        assert!(timeout.is_timeout());
        assert!(!timeout.is_precondition());

        let too_large = LinkError::PayloadTooLarge { len: 40000, max: 32768 };
        assert!(too_large.is_precondition());
        assert!(!too_large.is_timeout());

        assert!(LinkError::InvalidInversion(0x10).is_precondition());

        let io = LinkError::from(std::io::Error::other("gone"));
        assert!(!io.is_timeout());
        assert!(!io.is_precondition());
    }

    #[test]
    fn timeout_message_names_stage() {
        let err = LinkError::Timeout {
            stage: WaitStage::DeviceReady,
            waited: Duration::from_millis(10),
        };
        assert!(err.to_string().contains("BUSY low"));
    }
}
