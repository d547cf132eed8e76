//! This file provides access to the LPT port's registers.
//!
//! The link only ever needs three registers - data, status and control - at
//! fixed offsets from a base port address.  [`RegisterTransport`] is that
//! boundary.  [`DevPort`] implements it on Linux using `/dev/port`, which
//! maps I/O port addresses onto file offsets (and needs root, or
//! CAP_SYS_RAWIO).

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::constants::{CONTROL_REG_MASK, REG_CONTROL, REG_DATA, REG_STATUS, STATUS_REG_MASK};

/// Raw port I/O device on Linux.
pub const DEV_PORT_PATH: &str = "/dev/port";

/// Primitive access to the three LPT registers.  No protocol knowledge.
pub trait RegisterTransport {
    /// Write the 8 data lines.
    fn set_data(&mut self, data: u8) -> io::Result<()>;

    /// Write the control register.  Only the low 4 bits are meaningful.
    fn set_control(&mut self, control: u8) -> io::Result<()>;

    /// Read back the control register (low 4 bits).
    fn control(&mut self) -> io::Result<u8>;

    /// Read the status register.  The low 3 bits are reserved.
    fn status(&mut self) -> io::Result<u8>;
}

impl<T: RegisterTransport + ?Sized> RegisterTransport for &mut T {
    fn set_data(&mut self, data: u8) -> io::Result<()> {
        (**self).set_data(data)
    }

    fn set_control(&mut self, control: u8) -> io::Result<()> {
        (**self).set_control(control)
    }

    fn control(&mut self) -> io::Result<u8> {
        (**self).control()
    }

    fn status(&mut self) -> io::Result<u8> {
        (**self).status()
    }
}

/// LPT registers accessed via a port-mapped file, normally `/dev/port`.
#[derive(Debug)]
pub struct DevPort {
    file: File,
    path: PathBuf,
    base: u16,
}

impl DevPort {
    /// Open `/dev/port` for the LPT port at `base`.
    pub fn open(base: u16) -> io::Result<Self> {
        Self::open_path(DEV_PORT_PATH, base)
    }

    /// Open a port-mapped file at `path` for the LPT port at `base`.
    pub fn open_path(path: impl AsRef<Path>, base: u16) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        debug!("Opened {} for LPT port 0x{:03x}", path.display(), base);
        Ok(Self { file, path, base })
    }

    /// The base port address.
    pub fn base(&self) -> u16 {
        self.base
    }

    /// The port-mapped file in use.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn reg_offset(&self, reg: u16) -> io::Result<u64> {
        self.base
            .checked_add(reg)
            .map(u64::from)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("register {} beyond end of port space from 0x{:x}", reg, self.base),
                )
            })
    }

    fn write_reg(&mut self, reg: u16, value: u8) -> io::Result<()> {
        let offset = self.reg_offset(reg)?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&[value])
    }

    fn read_reg(&mut self, reg: u16) -> io::Result<u8> {
        let offset = self.reg_offset(reg)?;
        let mut buf = [0u8; 1];
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut buf)?;
        Ok(buf[0])
    }
}

impl RegisterTransport for DevPort {
    fn set_data(&mut self, data: u8) -> io::Result<()> {
        self.write_reg(REG_DATA, data)
    }

    fn set_control(&mut self, control: u8) -> io::Result<()> {
        self.write_reg(REG_CONTROL, control & CONTROL_REG_MASK)
    }

    fn control(&mut self) -> io::Result<u8> {
        Ok(self.read_reg(REG_CONTROL)? & CONTROL_REG_MASK)
    }

    fn status(&mut self) -> io::Result<u8> {
        // Ignore the 3 unused bits.
        Ok(self.read_reg(REG_STATUS)? & STATUS_REG_MASK)
    }
}
