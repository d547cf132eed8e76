//! This file implements orboot's command line.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use clap::Parser;
use std::path::PathBuf;

use crate::config::{LinkConfig, parse_port};
use crate::protocol::Wiring;

/// Uploads program images to an Outrun board's bootloader over a parallel
/// port, and reboots into them.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "orboot", version, author, long_about = None)]
pub struct Args {
    /// Main CPU RAM image (at most 32KB)
    pub main_image: PathBuf,

    /// Sub CPU RAM image (at most 32KB)
    pub sub_image: Option<PathBuf>,

    /// LPT base port, hex (0x378) or decimal
    #[arg(short, long, value_parser = parse_port)]
    pub port: Option<u16>,

    /// Port-mapped I/O device
    #[arg(long)]
    pub port_device: Option<PathBuf>,

    /// Strobe delay in nanoseconds (default: 50000)
    #[arg(long, value_name = "NS")]
    pub tx_delay: Option<u64>,

    /// Transmit timeout in milliseconds, 0 = disabled (default: 10000)
    #[arg(long, value_name = "MS")]
    pub tx_timeout: Option<u32>,

    /// Receive timeout in milliseconds, 0 = disabled (default: 0)
    #[arg(long, value_name = "MS")]
    pub rx_timeout: Option<u32>,

    /// Debug delay in milliseconds between transitions (default: 0)
    #[arg(long, value_name = "MS")]
    pub debug_delay: Option<u32>,

    /// Target status line wiring: direct or outrun-0.8e
    #[arg(long)]
    pub wiring: Option<Wiring>,

    /// Control line inversion mask, hex (0x2) or decimal
    #[arg(long, value_parser = parse_mask)]
    pub inversion: Option<u8>,

    /// Keep running after the reboot, printing nibble mode output
    #[arg(short, long, default_value_t = false)]
    pub console: bool,

    /// Config file (default: $ORBOOT_CONFIG_PATH or ./orboot.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Args {
    /// Apply any options given on the command line over `config`.
    pub fn apply_to(&self, config: &mut LinkConfig) {
        if let Some(port) = self.port {
            config.base_port = port;
        }
        if let Some(device) = &self.port_device {
            config.port_device = device.clone();
        }
        if let Some(ns) = self.tx_delay {
            config.strobe_delay_ns = ns;
        }
        if let Some(ms) = self.tx_timeout {
            config.tx_timeout_ms = ms;
        }
        if let Some(ms) = self.rx_timeout {
            config.rx_timeout_ms = ms;
        }
        if let Some(ms) = self.debug_delay {
            config.debug_delay_ms = ms;
        }
        if let Some(wiring) = self.wiring {
            config.wiring = wiring;
        }
        if let Some(mask) = self.inversion {
            config.control_inversion = Some(mask);
        }
    }
}

fn parse_mask(value: &str) -> Result<u8, String> {
    let value = value.trim();
    let parsed = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => value.parse::<u8>(),
    };
    parsed.map_err(|_| format!("'{value}' is not a valid mask"))
}
