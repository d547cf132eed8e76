//! This file implements orboot's configuration.
//!
//! Configuration is layered:
//! 1. Defaults.
//! 2. A TOML file, if one is given or found.
//! 3. Environment variables.
//! 4. Command line arguments - see [`crate::cli`].
//!
//! An example `orboot.toml`:
//! ```toml
//! base_port = "0x278"
//! wiring = "outrun-0.8e"
//! strobe_delay_ns = 60000
//! tx_timeout_ms = 5000
//! ```

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use serde::{Deserialize, Deserializer, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::{
    CONFIG_FILE_NAME, CONFIG_PATH_ENV, CONTROL_REG_MASK, DEFAULT_BASE_PORT,
    DEFAULT_DEBUG_DELAY_MS, DEFAULT_RX_TIMEOUT_MS, DEFAULT_STROBE_DELAY_NS,
    DEFAULT_TX_TIMEOUT_MS, MIN_SAFE_STROBE_DELAY_NS, REG_CONTROL,
};
use crate::infra::port::DEV_PORT_PATH;
use crate::protocol::Wiring;
use crate::util::time::Timing;

/// Environment variable overriding the base port.
pub const ENV_PORT: &str = "ORBOOT_PORT";
/// Environment variable overriding the strobe delay.
pub const ENV_TX_DELAY_NS: &str = "ORBOOT_TX_DELAY_NS";
/// Environment variable overriding the transmit timeout.
pub const ENV_TX_TIMEOUT_MS: &str = "ORBOOT_TX_TIMEOUT_MS";
/// Environment variable overriding the receive timeout.
pub const ENV_RX_TIMEOUT_MS: &str = "ORBOOT_RX_TIMEOUT_MS";
/// Environment variable overriding the debug delay.
pub const ENV_DEBUG_DELAY_MS: &str = "ORBOOT_DEBUG_DELAY_MS";

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML syntax: {0}")]
    Parse(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Things which are allowed, but probably a mistake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigWarning {
    /// Port 378 decimal, where 0x378 was likely meant.
    DecimalPort,
    /// A strobe delay too short for the optocouplers.
    ShortStrobeDelay(u64),
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigWarning::DecimalPort => {
                write!(f, "did you mean to use hexadecimal (0x378) notation?")
            }
            ConfigWarning::ShortStrobeDelay(ns) => write!(
                f,
                "TX delay of {}ns is short - it should be at least {} nanoseconds",
                ns, MIN_SAFE_STROBE_DELAY_NS
            ),
        }
    }
}

/// Link configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinkConfig {
    /// LPT base port.  May be given in TOML as an integer, or as a string in
    /// hex (`"0x378"`) or decimal.
    #[serde(deserialize_with = "deserialize_port")]
    pub base_port: u16,

    /// The port-mapped I/O device.
    pub port_device: PathBuf,

    /// How the target wires its status lines.
    pub wiring: Wiring,

    /// Which control lines the target inverts.  Defaults to the wiring's
    /// usual inversion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_inversion: Option<u8>,

    pub strobe_delay_ns: u64,
    pub debug_delay_ms: u32,
    pub rx_timeout_ms: u32,
    pub tx_timeout_ms: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            base_port: DEFAULT_BASE_PORT,
            port_device: PathBuf::from(DEV_PORT_PATH),
            wiring: Wiring::default(),
            control_inversion: None,
            strobe_delay_ns: DEFAULT_STROBE_DELAY_NS,
            debug_delay_ms: DEFAULT_DEBUG_DELAY_MS,
            rx_timeout_ms: DEFAULT_RX_TIMEOUT_MS,
            tx_timeout_ms: DEFAULT_TX_TIMEOUT_MS,
        }
    }
}

impl LinkConfig {
    /// The link timing policy this configuration describes.
    pub fn timing(&self) -> Timing {
        Timing::default()
            .with_strobe_delay_ns(self.strobe_delay_ns)
            .with_debug_delay_ms(self.debug_delay_ms)
            .with_rx_timeout_ms(self.rx_timeout_ms)
            .with_tx_timeout_ms(self.tx_timeout_ms)
    }

    /// The control inversion mask to use.
    pub fn control_inversion(&self) -> u8 {
        self.control_inversion
            .unwrap_or_else(|| self.wiring.default_control_inversion())
    }

    /// Check the configuration is usable.  Returns anything suspicious, for
    /// the caller to warn about.
    pub fn validate(&self) -> ConfigResult<Vec<ConfigWarning>> {
        if let Some(mask) = self.control_inversion {
            if mask & !CONTROL_REG_MASK != 0 {
                return Err(ConfigError::InvalidValue(format!(
                    "control_inversion 0x{mask:02x} is wider than 4 bits"
                )));
            }
        }

        if self.base_port.checked_add(REG_CONTROL).is_none() {
            return Err(ConfigError::InvalidValue(format!(
                "base_port 0x{:x} leaves no room for the control register",
                self.base_port
            )));
        }

        let mut warnings = Vec::new();
        if self.base_port == 378 {
            warnings.push(ConfigWarning::DecimalPort);
        }
        if self.strobe_delay_ns < MIN_SAFE_STROBE_DELAY_NS {
            warnings.push(ConfigWarning::ShortStrobeDelay(self.strobe_delay_ns));
        }
        Ok(warnings)
    }
}

/// Parse a port number, in hex (`0x378`) or decimal.
pub fn parse_port(value: &str) -> Result<u16, String> {
    let value = value.trim();
    let parsed = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => value.parse::<u16>(),
    };
    parsed.map_err(|_| format!("'{value}' is not a valid port - use hex (0x378) or decimal"))
}

fn deserialize_port<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Port::deserialize(deserializer)? {
        Port::Number(port) => Ok(port),
        Port::Text(text) => parse_port(&text).map_err(serde::de::Error::custom),
    }
}

/// Find the configuration file.
///
/// Search order:
/// 1. `ORBOOT_CONFIG_PATH` environment variable - which must exist if set.
/// 2. `./orboot.toml`.
///
/// Returns `Ok(None)` if there isn't one, which is fine.
pub fn find_config_file() -> ConfigResult<Option<PathBuf>> {
    if let Ok(env_path) = env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(Some(path));
        }
        return Err(ConfigError::FileNotFound(format!(
            "{} set to {}, which doesn't exist",
            CONFIG_PATH_ENV,
            path.display()
        )));
    }

    let local = env::current_dir()?.join(CONFIG_FILE_NAME);
    Ok(local.exists().then_some(local))
}

/// Parse a configuration file.  Applies no overrides.
pub fn read_config_file(path: &Path) -> ConfigResult<LinkConfig> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }
    let content = fs::read_to_string(path)?;
    let config = toml::from_str(&content)?;
    debug!("Read config from {}", path.display());
    Ok(config)
}

/// Load the configuration, from `config_path` if given, else from the file
/// found by [`find_config_file`], else the defaults.  Then applies any
/// environment variable overrides.
pub fn load_config(config_path: Option<&Path>) -> ConfigResult<LinkConfig> {
    let config_file = match config_path {
        Some(path) => Some(path.to_path_buf()),
        None => find_config_file()?,
    };

    let mut config = match config_file {
        Some(path) => read_config_file(&path)?,
        None => {
            debug!("No config file, using defaults");
            LinkConfig::default()
        }
    };

    apply_environment_overrides(&mut config)?;
    Ok(config)
}

/// Apply environment variable overrides to the configuration.
///
/// Supported environment variables:
/// - `ORBOOT_PORT` -> `base_port`
/// - `ORBOOT_TX_DELAY_NS` -> `strobe_delay_ns`
/// - `ORBOOT_TX_TIMEOUT_MS` -> `tx_timeout_ms`
/// - `ORBOOT_RX_TIMEOUT_MS` -> `rx_timeout_ms`
/// - `ORBOOT_DEBUG_DELAY_MS` -> `debug_delay_ms`
pub fn apply_environment_overrides(config: &mut LinkConfig) -> ConfigResult<()> {
    apply_overrides_from(config, |key| env::var(key).ok())
}

/// Apply overrides from any source of environment-style key/value pairs.
///
/// Unlike an unset variable, an unparseable value is an error.
pub fn apply_overrides_from<F>(config: &mut LinkConfig, lookup: F) -> ConfigResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(ENV_PORT) {
        config.base_port = parse_port(&value).map_err(ConfigError::InvalidValue)?;
    }
    if let Some(value) = lookup(ENV_TX_DELAY_NS) {
        config.strobe_delay_ns = parse_number(ENV_TX_DELAY_NS, &value)?;
    }
    if let Some(value) = lookup(ENV_TX_TIMEOUT_MS) {
        config.tx_timeout_ms = parse_number(ENV_TX_TIMEOUT_MS, &value)?;
    }
    if let Some(value) = lookup(ENV_RX_TIMEOUT_MS) {
        config.rx_timeout_ms = parse_number(ENV_RX_TIMEOUT_MS, &value)?;
    }
    if let Some(value) = lookup(ENV_DEBUG_DELAY_MS) {
        config.debug_delay_ms = parse_number(ENV_DEBUG_DELAY_MS, &value)?;
    }
    Ok(())
}

fn parse_number<N: std::str::FromStr>(key: &str, value: &str) -> ConfigResult<N> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(format!("{key}={value} is not a valid number")))
}
