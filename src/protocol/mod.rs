//! This module implements the link to the target - a modified IEEE1284
//! connection over a PC parallel port.
//!
//! Bytes go host to device in compatibility mode (nSTROBE/BUSY) and device
//! to host in nibble mode (nAUTOFEED/nACK).  The link is half duplex, and
//! only one side talks at a time, as dictated by the bootloader framing in
//! [`crate::boot`].

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

mod driver;
mod link;
pub(crate) mod lpt;
mod read;
pub(crate) mod status;
mod write;

pub use driver::{ByteLink, LinkError, WaitStage};
pub use link::Link;
pub use lpt::{Control, LptBus};
pub use status::{Status, Wiring};
