//! This file handles build-time information.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use log::info;

// Import the build-time information from the `built.rs` output file generated
// during the build process by `build.rs`.
mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

// Expose package version so it can be used in the application.
pub use built_info::PKG_VERSION;

/// Log build-time information.
pub fn log_build_info(bin_name: &str) {
    // General information
    info!("{} ({}) version {}", bin_name, built_info::PKG_NAME, built_info::PKG_VERSION);
    info!("Author: {}", built_info::PKG_AUTHORS);

    // Git information
    info!("Git commit: {}", built_info::GIT_COMMIT_HASH.unwrap_or("unknown"));
    info!("Git dirty: {}", built_info::GIT_DIRTY.unwrap_or(false));
    info!("Git version: {}", built_info::GIT_VERSION.unwrap_or("unknown"));

    // Build information
    info!("Built: {}", built_info::BUILT_TIME_UTC);
    info!("Rust version: {}", built_info::RUSTC_VERSION);
    info!("Target triple: {}", built_info::TARGET);
    info!("Build profile: {}", built_info::PROFILE);
}
