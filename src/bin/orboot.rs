// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use std::process::ExitCode;

fn main() -> ExitCode {
    orboot_rs::common_main(env!("CARGO_BIN_NAME"))
}
