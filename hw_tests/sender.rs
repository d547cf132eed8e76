//! test_sender
//!
//! Tests the link, by sending a NOP to the bootloader every couple of
//! seconds, and logging whether the target acknowledged it.  A target sat in
//! its bootloader should take every one.
//!
//! Needs port access, so usually has to be run as root.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use clap::Parser;
use log::{error, info, warn};
use std::process::ExitCode;
use std::time::Duration;

use orboot_rs::config::parse_port;
use orboot_rs::constants::DEFAULT_BASE_PORT;
use orboot_rs::entry::{init_logging, open_link};
use orboot_rs::{Bootloader, Clock, DevPort, LinkConfig, SystemClock, Wiring};

pub const DELAY: Duration = Duration::from_millis(2500);

#[derive(Parser, Debug)]
#[command(name = "test_sender")]
struct Args {
    /// LPT base port, hex (0x378) or decimal
    #[arg(short, long, value_parser = parse_port, default_value_t = DEFAULT_BASE_PORT)]
    port: u16,

    /// Target status line wiring: direct or outrun-0.8e
    #[arg(long, default_value_t = Wiring::default())]
    wiring: Wiring,

    /// Transmit timeout in milliseconds
    #[arg(long, default_value_t = 1000)]
    tx_timeout: u32,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(true);
    info!("orboot test sender, port 0x{:03x}", args.port);

    let config = LinkConfig {
        base_port: args.port,
        wiring: args.wiring,
        tx_timeout_ms: args.tx_timeout,
        ..Default::default()
    };

    let port = match DevPort::open(config.base_port) {
        Ok(port) => port,
        Err(e) => {
            error!("Failed to open port: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let link = match open_link(port, SystemClock::calibrate(), &config) {
        Ok(link) => link,
        Err(e) => {
            error!("Failed to initialize link: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let mut bootloader = Bootloader::new(link);

    let mut sent = 0u32;
    let mut failed = 0u32;
    loop {
        match bootloader.nop() {
            Ok(()) => {
                sent += 1;
                info!("NOP acknowledged ({} ok, {} failed)", sent, failed);
            }
            Err(e) => {
                failed += 1;
                warn!("NOP failed: {} ({} ok, {} failed)", e, sent, failed);
            }
        }
        bootloader.link().clock().sleep(DELAY);
    }
}
