//! This file decodes the raw LPT status register into canonical status lines.
//!
//! The Outrun 0.8E board reversed the bit order of the A20..A23 lines it
//! drives onto the status pins, and they are inverted too:
//!
//! | Outrun PCB  | 0.8E Lite | LPT pin | Inverted | Signal    | Register | Nibble |
//! |-------------|-----------|---------|----------|-----------|----------|--------|
//! | A23 / Bit 0 | Inverted  | 11      | Yes      | BUSY      | Status:7 | 3/7    |
//! | A22 / Bit 1 | Inverted  | 12      | -        | PAPER OUT | Status:5 | 2/6    |
//! | A21 / Bit 2 | Inverted  | 13      | -        | SELECT    | Status:4 | 1/5    |
//! | A20 / Bit 3 | Inverted  | 15      | -        | nERROR    | Status:3 | 0/4    |
//! | A19 / Bit 4 | Inverted  | 10      | -        | nACK      | Status:6 | PtrClk |
//!
//! So for that board register bits 4 and 5 are swapped, and bits 7 and 3 are
//! swapped and inverted.  The mapping is an involution, so encoding (which
//! the simulated device needs) is the same operation as decoding.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::constants::STATUS_REG_MASK;

bitflags! {
    /// Canonical status lines, in standard LPT status register positions.
    ///
    /// As with a real LPT status register, BUSY reads inverted: the
    /// `NOT_BUSY` bit is set when the BUSY line is low.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Status: u8 {
        /// nERROR - nibble bit 0 (or 4).
        const N_ERROR = 1 << 3;
        /// SELECT - nibble bit 1 (or 5).
        const SELECT = 1 << 4;
        /// PAPER OUT - nibble bit 2 (or 6).
        const PAPER_OUT = 1 << 5;
        /// nACK - PtrClk (data ready, active low) in nibble mode.
        const N_ACK = 1 << 6;
        /// BUSY, inverted - nibble bit 3 (or 7), once inverted back.
        const NOT_BUSY = 1 << 7;
    }
}

impl Status {
    /// The status lines which carry nibble bits 0-2, unshifted.
    pub const NIBBLE_LOW_BITS: Status = Status::N_ERROR
        .union(Status::SELECT)
        .union(Status::PAPER_OUT);

    /// Extracts the nibble a device is presenting in nibble mode.
    ///
    /// nERROR, SELECT and PAPER OUT are bits 0-2.  Bit 3 is BUSY, and as the
    /// register reads BUSY inverted we invert it back.
    #[inline(always)]
    pub const fn nibble(self) -> u8 {
        ((self.bits() & Self::NIBBLE_LOW_BITS.bits()) >> 3)
            | (((self.bits() & Self::NOT_BUSY.bits()) ^ Self::NOT_BUSY.bits()) >> 4)
    }

    /// The status lines a device drives to present `nibble`.  The inverse of
    /// [`Status::nibble`].  Does not include `N_ACK`.
    pub const fn from_nibble(nibble: u8) -> Self {
        let low = (nibble & 0x07) << 3;
        let busy = ((nibble & 0x08) << 4) ^ Self::NOT_BUSY.bits();
        Self::from_bits_truncate(low | busy)
    }

    /// True if BUSY is low, i.e. the device can accept a byte.
    #[inline(always)]
    pub const fn is_ready(self) -> bool {
        self.contains(Self::NOT_BUSY)
    }

    /// True if `high` are all set and `low` are all clear.
    #[inline(always)]
    pub const fn matches(self, high: Status, low: Status) -> bool {
        self.contains(high) && !self.intersects(low)
    }
}

/// The target board's wiring of its status outputs onto the LPT status
/// pins.  Each variant is a fixed permutation plus inversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Wiring {
    /// Wired straight through - the raw register is already canonical.
    Direct,

    /// The Outrun 0.8E board, with reversed and inverted A20..A23.
    #[default]
    #[serde(rename = "outrun-0.8e")]
    Outrun08E,
}

impl Wiring {
    /// Decode a raw status register value.  The 3 reserved low bits are
    /// ignored.
    #[inline(always)]
    pub const fn decode(self, raw: u8) -> Status {
        let raw = raw & STATUS_REG_MASK;
        let bits = match self {
            Wiring::Direct => raw,
            Wiring::Outrun08E => Self::swizzle_08e(raw),
        };
        Status::from_bits_truncate(bits)
    }

    /// Encode canonical status lines into the raw register value this wiring
    /// would produce.
    pub const fn encode(self, status: Status) -> u8 {
        match self {
            Wiring::Direct => status.bits(),
            // The 0.8E swizzle is its own inverse.
            Wiring::Outrun08E => Self::swizzle_08e(status.bits()),
        }
    }

    /// The control lines this board's wiring inverts, if the user doesn't
    /// say otherwise.
    pub const fn default_control_inversion(self) -> u8 {
        match self {
            Wiring::Direct => 0,
            // We have AUTOFEED inverted on the PCB.
            Wiring::Outrun08E => super::lpt::Control::AUTO_FEED.bits(),
        }
    }

    // Swap bits 4 and 5, and swap-and-invert bits 3 and 7.  nACK (6) stays.
    #[inline(always)]
    const fn swizzle_08e(bits: u8) -> u8 {
        (((bits & 0x08) << 4) ^ 0x80)
            | ((bits & 0x10) << 1)
            | ((bits & 0x20) >> 1)
            | (bits & 0x40)
            | (((bits & 0x80) >> 4) ^ 0x08)
    }
}

impl core::fmt::Display for Wiring {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Wiring::Direct => write!(f, "direct"),
            Wiring::Outrun08E => write!(f, "outrun-0.8e"),
        }
    }
}

impl core::str::FromStr for Wiring {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "direct" => Ok(Wiring::Direct),
            "outrun-0.8e" | "outrun" | "0.8e" => Ok(Wiring::Outrun08E),
            other => Err(format!("unknown wiring '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_then_encode_round_trips_meaningful_bits() {
        for wiring in [Wiring::Direct, Wiring::Outrun08E] {
            for raw in 0..=u8::MAX {
                let status = wiring.decode(raw);
                assert_eq!(
                    wiring.encode(status),
                    raw & STATUS_REG_MASK,
                    "{wiring} raw 0x{raw:02x}"
                );
            }
        }
    }

    #[test]
    fn reserved_bits_are_ignored() {
        for wiring in [Wiring::Direct, Wiring::Outrun08E] {
            for raw in 0..=u8::MAX {
                assert_eq!(wiring.decode(raw), wiring.decode(raw & 0xF8));
            }
        }
    }

    #[test]
    fn outrun_swaps_and_inverts() {
        let w = Wiring::Outrun08E;

        // Everything low on the pins: bits 3 and 7 invert to set.
        assert_eq!(w.decode(0x00), Status::N_ERROR | Status::NOT_BUSY);

        // Raw bit 4 (SELECT pin) lands on PAPER OUT and vice versa.
        assert!(w.decode(0x10).contains(Status::PAPER_OUT));
        assert!(!w.decode(0x10).contains(Status::SELECT));
        assert!(w.decode(0x20).contains(Status::SELECT));
        assert!(!w.decode(0x20).contains(Status::PAPER_OUT));

        // nACK is untouched.
        assert!(w.decode(0x40).contains(Status::N_ACK));
        assert!(!w.decode(0x00).contains(Status::N_ACK));

        // Raw bit 7 lands, inverted, on bit 3; raw bit 3 inverted on bit 7.
        assert!(!w.decode(0x80).contains(Status::N_ERROR));
        assert!(!w.decode(0x08).contains(Status::NOT_BUSY));
    }

    #[test]
    fn direct_is_identity() {
        for raw in (0..=u8::MAX).map(|r| r & STATUS_REG_MASK) {
            assert_eq!(Wiring::Direct.decode(raw).bits(), raw);
        }
    }

    #[test]
    fn nibble_extraction() {
        // BUSY high (NOT_BUSY clear) is nibble bit 3.
        assert_eq!(Status::empty().nibble(), 0x8);
        assert_eq!(Status::NOT_BUSY.nibble(), 0x0);
        assert_eq!((Status::N_ERROR | Status::NOT_BUSY).nibble(), 0x1);
        assert_eq!((Status::SELECT | Status::NOT_BUSY).nibble(), 0x2);
        assert_eq!((Status::PAPER_OUT | Status::NOT_BUSY).nibble(), 0x4);
        assert_eq!(Status::all().nibble(), 0x7);
    }

    #[test]
    fn from_nibble_is_inverse_of_nibble() {
        for nibble in 0..16u8 {
            let status = Status::from_nibble(nibble);
            assert!(!status.contains(Status::N_ACK));
            assert_eq!(status.nibble(), nibble);
            assert_eq!((status | Status::N_ACK).nibble(), nibble);
        }
    }

    #[test]
    fn matches_high_and_low_masks() {
        let s = Status::NOT_BUSY | Status::SELECT;
        assert!(s.matches(Status::NOT_BUSY, Status::empty()));
        assert!(s.matches(Status::empty(), Status::N_ACK));
        assert!(!s.matches(Status::N_ACK, Status::empty()));
        assert!(!s.matches(Status::empty(), Status::SELECT));
        assert!(s.is_ready());
    }

    #[test]
    fn wiring_parses() {
        assert_eq!("direct".parse::<Wiring>(), Ok(Wiring::Direct));
        assert_eq!("Outrun-0.8E".parse::<Wiring>(), Ok(Wiring::Outrun08E));
        assert!("sideways".parse::<Wiring>().is_err());
        assert_eq!(Wiring::Outrun08E.to_string(), "outrun-0.8e");
    }

    #[test]
    fn default_inversions() {
        assert_eq!(Wiring::Direct.default_control_inversion(), 0);
        assert_eq!(Wiring::Outrun08E.default_control_inversion(), 0x02);
    }
}
