//! This module contains constants for orboot.
//!
//! Timing constants specific to the link handshake live in
//! [`crate::util::time::lpt`].

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use static_assertions::const_assert;

//
// Register transport
//

/// Default base port address - LPT1.
pub const DEFAULT_BASE_PORT: u16 = 0x378;

/// Offset of the data register from the base port.
pub const REG_DATA: u16 = 0;

/// Offset of the status register from the base port.
pub const REG_STATUS: u16 = 1;

/// Offset of the control register from the base port.
pub const REG_CONTROL: u16 = 2;

/// Only the top 5 bits of the status register carry signals.
pub const STATUS_REG_MASK: u8 = 0xF8;

/// The control register is 4 bits wide.
pub const CONTROL_REG_MASK: u8 = 0x0F;

//
// Default timings
//

/// Default strobe (settle) delay, in nanoseconds.  35us is about the minimum
/// transition time for the TLP521 optocouplers used on the Outrun board, so
/// we leave some headroom.
pub const DEFAULT_STROBE_DELAY_NS: u64 = 50_000;

/// Strobe delays below this are unlikely to work, and get a warning.
pub const MIN_SAFE_STROBE_DELAY_NS: u64 = 25_000;

/// Default debug delay, in milliseconds.  Zero disables it.
pub const DEFAULT_DEBUG_DELAY_MS: u32 = 0;

/// Default receive timeout, in milliseconds.  Zero means wait forever.
pub const DEFAULT_RX_TIMEOUT_MS: u32 = 0;

/// Default transmit timeout used by the boot sequence, in milliseconds.
pub const DEFAULT_TX_TIMEOUT_MS: u32 = 10 * 1000;

//
// Bootloader framing
//

/// Maximum size of an upload - the size of each of the target's RAMs.
pub const MAX_UPLOAD_SIZE: usize = 32 * 1024;

// The length prefix is a u16, so the maximum upload has to fit in one.
const_assert!(MAX_UPLOAD_SIZE <= u16::MAX as usize + 1);
const_assert!(MAX_UPLOAD_SIZE == 32768);

//
// Configuration
//

/// Environment variable holding the config file path.
pub const CONFIG_PATH_ENV: &str = "ORBOOT_CONFIG_PATH";

/// Default config file name, searched for in the current directory.
pub const CONFIG_FILE_NAME: &str = "orboot.toml";
