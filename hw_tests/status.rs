//! test_status
//!
//! Tests the cable and target wiring, by watching the status lines - logs
//! each decoded status line as it changes.  Run it while the target drives
//! its outputs, or while probing the lines by hand.
//!
//! Needs port access, so usually has to be run as root.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use clap::Parser;
use log::{error, info};
use std::process::ExitCode;
use std::time::Duration;

use orboot_rs::config::parse_port;
use orboot_rs::constants::DEFAULT_BASE_PORT;
use orboot_rs::entry::init_logging;
use orboot_rs::{Clock, DevPort, Link, Status, SystemClock, Wiring};

pub const POLL_INTERVAL: Duration = Duration::from_millis(1);

const LINES: [(Status, &str); 5] = [
    (Status::N_ERROR, "nERROR"),
    (Status::SELECT, "SELECT"),
    (Status::PAPER_OUT, "PAPER OUT"),
    (Status::N_ACK, "nACK"),
    (Status::NOT_BUSY, "BUSY (inverted)"),
];

#[derive(Parser, Debug)]
#[command(name = "test_status")]
struct Args {
    /// LPT base port, hex (0x378) or decimal
    #[arg(short, long, value_parser = parse_port, default_value_t = DEFAULT_BASE_PORT)]
    port: u16,

    /// Target status line wiring: direct or outrun-0.8e
    #[arg(long, default_value_t = Wiring::default())]
    wiring: Wiring,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(false);
    info!("orboot test status, port 0x{:03x}, wiring {}", args.port, args.wiring);

    let port = match DevPort::open(args.port) {
        Ok(port) => port,
        Err(e) => {
            error!("Failed to open port: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let clock = SystemClock::calibrate();
    let mut link = Link::with_clock(port, args.wiring, clock);

    let mut last: Option<Status> = None;
    loop {
        let status = match link.status() {
            Ok(status) => status,
            Err(e) => {
                error!("Failed to read status: {}", e);
                return ExitCode::FAILURE;
            }
        };

        match last {
            None => info!("Status {:?}, nibble 0x{:x}", status, status.nibble()),
            Some(prev) if prev != status => {
                for (line, name) in LINES {
                    if (prev ^ status).contains(line) {
                        let level = if status.contains(line) { "set" } else { "clear" };
                        info!("{} changed to {}", name, level);
                    }
                }
            }
            _ => (),
        }
        last = Some(status);

        link.clock().sleep(POLL_INTERVAL);
    }
}
