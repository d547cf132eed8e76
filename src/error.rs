//! Top level error type, for the `orboot` binary.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use std::io;
use std::path::PathBuf;

use crate::boot::BootError;
use crate::config::ConfigError;
use crate::image::ImageError;
use crate::protocol::LinkError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error("Failed to open {} for LPT port 0x{base:03x}: {source}", .path.display())]
    Port {
        path: PathBuf,
        base: u16,
        #[source]
        source: io::Error,
    },

    #[error("Failed to initialize link: {0}")]
    Link(#[from] LinkError),

    #[error(transparent)]
    Boot(#[from] BootError),

    #[error("Failed to write console output: {0}")]
    Output(#[source] io::Error),
}

impl Error {
    /// True if the device stopped responding - as opposed to orboot being
    /// misconfigured.
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Link(e) => e.is_timeout(),
            Error::Boot(e) => e.source.is_timeout(),
            _ => false,
        }
    }
}
