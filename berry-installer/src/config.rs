//! Installer preferences loaded from TOML.
//!
//! Every section and key is optional:
//!
//! ```toml
//! [network]
//! fixate_mac = true
//! interface = "eth0"
//!
//! [display]
//! disable_overscan = true
//!
//! [audio]
//! sound = "hdmi"
//!
//! [keyboard]
//! layout = "de"
//!
//! [storage]
//! boot_mount = "/boot"
//! data_mount = "/mnt"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/berryboot/installer.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InstallerConfig {
    pub network: NetworkConfig,
    pub display: DisplayConfig,
    pub audio: AudioConfig,
    pub keyboard: KeyboardConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Pin the current MAC address on the kernel command line.
    pub fixate_mac: bool,
    /// Interface whose address is pinned.
    pub interface: String,
    /// Explicit address used instead of the interface's.
    pub mac_address: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            fixate_mac: false,
            interface: "eth0".to_string(),
            mac_address: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub disable_overscan: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// `hdmi` or `headphones`; unset leaves the firmware default.
    pub sound: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct KeyboardConfig {
    pub layout: String,
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        Self {
            layout: "us".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub boot_mount: PathBuf,
    pub data_mount: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            boot_mount: PathBuf::from("/boot"),
            data_mount: PathBuf::from("/mnt"),
        }
    }
}

pub fn parse_config_toml(toml_str: &str) -> Result<InstallerConfig> {
    toml::from_str(toml_str).context("failed to parse installer config")
}

impl InstallerConfig {
    /// Load `path`, or [`DEFAULT_CONFIG_PATH`] when none is given. A missing file yields
    /// the defaults; a malformed one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                log::info!("no config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", path.display()))
            }
        };
        parse_config_toml(&content).with_context(|| format!("in {}", path.display()))
    }
}
