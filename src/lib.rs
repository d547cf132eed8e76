//! orboot
//!
//! This implements the host side of the Outrun board's parallel port
//! bootloader.  Program images are uploaded to the target's main and sub
//! CPU RAM over a modified IEEE1284 link, and the target is then rebooted
//! into them.  Optionally, the target's output is read back and printed.
//!
//! The layers, from the bottom up:
//! - [`infra::port`] - access to the three LPT registers.
//! - [`protocol`] - the link itself: status line decoding, and the
//!   compatibility mode (send) and nibble mode (receive) byte handshakes.
//! - [`boot`] - the bootloader's command framing.
//! - [`entry`] - configuration, image loading and the boot sequence, for the
//!   `orboot` binary.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

// Declare all of this library's modules.
pub mod boot;
pub mod cli;
pub mod config;
pub mod constants;
pub mod entry;
pub mod error;
pub mod image;
pub mod infra;
pub mod protocol;
pub mod test;
pub mod util;

pub use boot::{BootError, BootStage, Bootloader, Command, Target};
pub use config::{ConfigError, LinkConfig};
pub use entry::common_main;
pub use error::Error;
pub use image::{Image, ImageError};
pub use infra::port::{DevPort, RegisterTransport};
pub use protocol::{ByteLink, Link, LinkError, Status, WaitStage, Wiring};
pub use util::time::{Clock, SystemClock, Timing};
