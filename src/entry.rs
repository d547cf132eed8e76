//! This file contains the main entry point for orboot, shared by the
//! binaries.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use clap::Parser;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use std::io::Write;
use std::process::ExitCode;

use crate::boot::Bootloader;
use crate::cli::Args;
use crate::config::{LinkConfig, load_config};
use crate::error::Error;
use crate::image::Image;
use crate::infra::port::{DevPort, RegisterTransport};
use crate::protocol::{ByteLink, Link, LinkError};
use crate::util::built::{PKG_VERSION, log_build_info};
use crate::util::time::{Clock, SystemClock};

/// Parse the command line, set up logging, and run the boot sequence.
///
/// Any failure is logged, and results in exit code 1.
pub fn common_main(bin_name: &str) -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    info!("Outrun Bootloader {}", PKG_VERSION);
    log_build_info(bin_name);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Install the logger.  `RUST_LOG` wins over `verbose`.
pub fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

/// Load the configuration: file, then environment, then command line.
/// Warns about anything suspicious.
pub fn configure(args: &Args) -> Result<LinkConfig, Error> {
    let mut config = load_config(args.config.as_deref())?;
    args.apply_to(&mut config);

    for warning in config.validate()? {
        warn!("Warning: {}", warning);
    }
    debug!("Configuration {:?}", config);

    Ok(config)
}

/// Run orboot against the real parallel port.
pub fn run(args: &Args) -> Result<(), Error> {
    let config = configure(args)?;

    // Load images before touching the hardware.
    let main = Image::load(&args.main_image)?;
    let sub = args.sub_image.as_ref().map(Image::load).transpose()?;

    let port = DevPort::open_path(&config.port_device, config.base_port).map_err(|source| {
        Error::Port {
            path: config.port_device.clone(),
            base: config.base_port,
            source,
        }
    })?;

    let link = open_link(port, SystemClock::calibrate(), &config)?;
    let mut stdout = std::io::stdout().lock();
    boot(link, &main, sub.as_ref(), args.console, &mut stdout)
}

/// Create a link, apply the configuration's timing and control inversion,
/// and reset it.
pub fn open_link<T, C>(port: T, clock: C, config: &LinkConfig) -> Result<Link<T, C>, LinkError>
where
    T: RegisterTransport,
    C: Clock,
{
    let mut link = Link::with_clock(port, config.wiring, clock);
    link.set_timing(config.timing())?;
    link.set_control_inversion(config.control_inversion())?;
    link.reset()?;
    Ok(link)
}

/// Run the boot sequence over `link`.  If `console` is set, then copy the
/// target's output to `out` until the link fails.
pub fn boot<L, W>(
    link: L,
    main: &Image,
    sub: Option<&Image>,
    console: bool,
    out: &mut W,
) -> Result<(), Error>
where
    L: ByteLink,
    W: Write,
{
    let mut bootloader = Bootloader::new(link);
    bootloader.boot(main.data(), sub.map(Image::data))?;
    info!("Booted");

    if console {
        info!("Console output follows");
        for byte in bootloader.console() {
            out.write_all(&[byte?]).map_err(Error::Output)?;
            out.flush().map_err(Error::Output)?;
        }
    }

    Ok(())
}
