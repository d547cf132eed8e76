//! This build script exposes build-time information to the application, so
//! `orboot` can log what it was built from at startup.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

fn main() {
    // Re-run this build script if anything in git changes.
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/");

    // Re-run this build script if RUST_LOG changes.
    println!("cargo:rerun-if-env-changed=RUST_LOG");

    // Get built-time information
    built::write_built_file().expect("Failed to acquire build-time information");
}
