// This file is part of maglevd, an application to control a magnetic levitation rig together with its FPGA fabric.
//
// Copyright 2025 Canonical Ltd.
//
// SPDX-License-Identifier: GPL-3.0-only
//
// maglevd is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License version 3, as published by the Free Software Foundation.
//
// maglevd is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranties of MERCHANTABILITY, SATISFACTORY QUALITY, or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with this program.  If not, see http://www.gnu.org/licenses/.

pub mod config_files;

use crate::config::config_files::{TomlConfig, config_from_file};
use log::{trace, warn};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

// These are hardcoded backups used whenever neither config file provides a value.

/// Address the HTTP control surface binds to.
pub static LISTEN_ADDR: &str = "0.0.0.0:8888";

/// Upper bound on request bodies, which in practice means bitstream uploads.
pub const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Unix socket of the local key-value store.
pub static STORE_SOCKET_PATH: &str = "/tmp/redis.sock";

/// The driver-decided location of fpga_manager objects. Typically `/sys/class/fpga_manager/`.
pub static FPGA_MANAGERS_DIR: &str = "/sys/class/fpga_manager/";

pub static DEVICE_HANDLE: &str = "fpga0";

/// Directory searched by the kernel firmware loader. Typically `/lib/firmware/`.
pub static FIRMWARE_DIR: &str = "/lib/firmware/";

/// Character device accepting raw bitstreams for partial reconfiguration.
pub static RECONFIG_DEVICE: &str = "/dev/xdevcfg";

/// Parent directory of the per-partition decoupler controls.
pub static DECOUPLER_DIR: &str = "/sys/class/pr_decoupler/";

pub static STAGING_DIR: &str = "/tmp";

pub static CONVERTER: &str = "bootgen";

pub static CONVERTER_ARCH: &str = "zynq";

pub const MAX_PARTITIONS: u32 = 4;

pub static VENDOR_CONFIG_PATH: &str = "/usr/lib/maglevd/config.toml";

pub static USER_CONFIG_PATH: &str = "/etc/maglevd/config.toml";

/// Which field of the upload metadata selects the reconfiguration flavour.
///
/// A deployment runs exactly one scheme. The wrapper scheme converts images with an external
/// tool and loads them through the firmware directory; the partition scheme writes raw images
/// to the reconfiguration device, gating the targeted partition with its decoupler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorScheme {
    Wrapper,
    #[default]
    Partition,
}

impl fmt::Display for SelectorScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectorScheme::Wrapper => write!(f, "wrapper"),
            SelectorScheme::Partition => write!(f, "partition"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    pub socket_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BitstreamConfig {
    pub selector: SelectorScheme,
    pub max_partitions: u32,
    pub staging_dir: PathBuf,
    pub converter: String,
    pub converter_arch: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SystemPaths {
    pub fpga_managers_dir: PathBuf,
    pub device_handle: String,
    pub firmware_dir: PathBuf,
    pub reconfig_device: PathBuf,
    pub decoupler_dir: PathBuf,
}

impl SystemPaths {
    /// `<fpga_managers_dir>/<device_handle>/<attribute>`
    pub fn fpga_attribute(&self, attribute: &str) -> PathBuf {
        self.fpga_managers_dir
            .join(&self.device_handle)
            .join(attribute)
    }

    /// `<decoupler_dir>/decoupler<partition>/decouple`
    pub fn decoupler_control(&self, partition: u32) -> PathBuf {
        self.decoupler_dir
            .join(format!("decoupler{partition}"))
            .join("decouple")
    }
}

/// Fully resolved daemon configuration. Every field has a value, either from a config file or
/// from the hardcoded defaults above.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub bitstream: BitstreamConfig,
    pub system_paths: SystemPaths,
}

impl Default for SystemConfig {
    fn default() -> Self {
        TomlConfig::default().into()
    }
}

/// User config overrides vendor config and vendor config overrides hardcoded defaults.
///
/// A config file that is missing or cannot be parsed is skipped with a warning, so the
/// daemon always comes up.
pub fn load_system_config(user_config_path: Option<&Path>) -> SystemConfig {
    let vendor_config = config_from_file(Path::new(VENDOR_CONFIG_PATH)).unwrap_or_else(|e| {
        warn!("Using hardcoded values for vendor config because loading config failed: {e}");
        TomlConfig::default()
    });
    let user_path = user_config_path.unwrap_or(Path::new(USER_CONFIG_PATH));
    let user_config = config_from_file(user_path).unwrap_or_else(|e| {
        warn!("Using hardcoded values for user config because loading config failed: {e}");
        TomlConfig::default()
    });
    trace!("Merging user_config: {user_config:?} with vendor_config {vendor_config:?}");
    let merged: SystemConfig = user_config.merge(vendor_config).into();
    trace!("Resulting config: {merged:?}");
    merged
}
