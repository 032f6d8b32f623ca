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

use crate::config::{self, SelectorScheme};
use crate::error::MaglevdError;
use crate::system_io::fs_read;
use log::trace;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// This is the top level struct which holds all sections
#[derive(Debug, Default, Deserialize)]
pub(crate) struct TomlConfig {
    server: Option<ServerToml>,
    store: Option<StoreToml>,
    bitstream: Option<BitstreamToml>,
    system_paths: Option<SystemPathsToml>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerToml {
    listen_addr: Option<String>,
    max_upload_bytes: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct StoreToml {
    socket_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct BitstreamToml {
    selector: Option<SelectorScheme>,
    max_partitions: Option<u32>,
    staging_dir: Option<PathBuf>,
    converter: Option<String>,
    converter_arch: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SystemPathsToml {
    fpga_managers_dir: Option<PathBuf>,
    device_handle: Option<String>,
    firmware_dir: Option<PathBuf>,
    reconfig_device: Option<PathBuf>,
    decoupler_dir: Option<PathBuf>,
}

impl TomlConfig {
    pub(crate) fn merge(self, fallback: TomlConfig) -> TomlConfig {
        TomlConfig {
            server: merge_section(self.server, fallback.server, ServerToml::merge),
            store: merge_section(self.store, fallback.store, StoreToml::merge),
            bitstream: merge_section(self.bitstream, fallback.bitstream, BitstreamToml::merge),
            system_paths: merge_section(
                self.system_paths,
                fallback.system_paths,
                SystemPathsToml::merge,
            ),
        }
    }
}

fn merge_section<T>(primary: Option<T>, fallback: Option<T>, merge: fn(T, T) -> T) -> Option<T> {
    match (primary, fallback) {
        (Some(p), Some(f)) => Some(merge(p, f)),
        (p, f) => p.or(f),
    }
}

impl ServerToml {
    fn merge(self, fallback: ServerToml) -> ServerToml {
        ServerToml {
            listen_addr: self.listen_addr.or(fallback.listen_addr),
            max_upload_bytes: self.max_upload_bytes.or(fallback.max_upload_bytes),
        }
    }
}

impl StoreToml {
    fn merge(self, fallback: StoreToml) -> StoreToml {
        StoreToml {
            socket_path: self.socket_path.or(fallback.socket_path),
        }
    }
}

impl BitstreamToml {
    fn merge(self, fallback: BitstreamToml) -> BitstreamToml {
        BitstreamToml {
            selector: self.selector.or(fallback.selector),
            max_partitions: self.max_partitions.or(fallback.max_partitions),
            staging_dir: self.staging_dir.or(fallback.staging_dir),
            converter: self.converter.or(fallback.converter),
            converter_arch: self.converter_arch.or(fallback.converter_arch),
        }
    }
}

impl SystemPathsToml {
    fn merge(self, fallback: SystemPathsToml) -> SystemPathsToml {
        SystemPathsToml {
            fpga_managers_dir: self.fpga_managers_dir.or(fallback.fpga_managers_dir),
            device_handle: self.device_handle.or(fallback.device_handle),
            firmware_dir: self.firmware_dir.or(fallback.firmware_dir),
            reconfig_device: self.reconfig_device.or(fallback.reconfig_device),
            decoupler_dir: self.decoupler_dir.or(fallback.decoupler_dir),
        }
    }
}

impl From<ServerToml> for config::ServerConfig {
    fn from(value: ServerToml) -> Self {
        config::ServerConfig {
            listen_addr: value.listen_addr.unwrap_or_else(|| {
                trace!("No listen_addr provided. Using hardcoded value.");
                config::LISTEN_ADDR.to_string()
            }),
            max_upload_bytes: value.max_upload_bytes.unwrap_or_else(|| {
                trace!("No max_upload_bytes provided. Using hardcoded value.");
                config::MAX_UPLOAD_BYTES
            }),
        }
    }
}

impl From<StoreToml> for config::StoreConfig {
    fn from(value: StoreToml) -> Self {
        config::StoreConfig {
            socket_path: value.socket_path.unwrap_or_else(|| {
                trace!("No socket_path provided. Using hardcoded value.");
                config::STORE_SOCKET_PATH.into()
            }),
        }
    }
}

impl From<BitstreamToml> for config::BitstreamConfig {
    fn from(value: BitstreamToml) -> Self {
        config::BitstreamConfig {
            selector: value.selector.unwrap_or_else(|| {
                trace!("No selector provided. Using the default scheme.");
                SelectorScheme::default()
            }),
            max_partitions: value.max_partitions.unwrap_or_else(|| {
                trace!("No max_partitions provided. Using hardcoded value.");
                config::MAX_PARTITIONS
            }),
            staging_dir: value.staging_dir.unwrap_or_else(|| {
                trace!("No staging_dir provided. Using hardcoded value.");
                config::STAGING_DIR.into()
            }),
            converter: value.converter.unwrap_or_else(|| {
                trace!("No converter provided. Using hardcoded value.");
                config::CONVERTER.to_string()
            }),
            converter_arch: value.converter_arch.unwrap_or_else(|| {
                trace!("No converter_arch provided. Using hardcoded value.");
                config::CONVERTER_ARCH.to_string()
            }),
        }
    }
}

impl From<SystemPathsToml> for config::SystemPaths {
    fn from(value: SystemPathsToml) -> Self {
        config::SystemPaths {
            fpga_managers_dir: value.fpga_managers_dir.unwrap_or_else(|| {
                trace!("No fpga_managers_dir provided. Using hardcoded value.");
                config::FPGA_MANAGERS_DIR.into()
            }),
            device_handle: value.device_handle.unwrap_or_else(|| {
                trace!("No device_handle provided. Using hardcoded value.");
                config::DEVICE_HANDLE.to_string()
            }),
            firmware_dir: value.firmware_dir.unwrap_or_else(|| {
                trace!("No firmware_dir provided. Using hardcoded value.");
                config::FIRMWARE_DIR.into()
            }),
            reconfig_device: value.reconfig_device.unwrap_or_else(|| {
                trace!("No reconfig_device provided. Using hardcoded value.");
                config::RECONFIG_DEVICE.into()
            }),
            decoupler_dir: value.decoupler_dir.unwrap_or_else(|| {
                trace!("No decoupler_dir provided. Using hardcoded value.");
                config::DECOUPLER_DIR.into()
            }),
        }
    }
}

impl From<TomlConfig> for config::SystemConfig {
    fn from(value: TomlConfig) -> Self {
        trace!("Creating Config from {value:?}");
        config::SystemConfig {
            server: value.server.unwrap_or_default().into(),
            store: value.store.unwrap_or_default().into(),
            bitstream: value.bitstream.unwrap_or_default().into(),
            system_paths: value.system_paths.unwrap_or_default().into(),
        }
    }
}

fn toml_str_to_config(toml_string: &str, file: &Path) -> Result<TomlConfig, MaglevdError> {
    toml::from_str(toml_string).map_err(|e| MaglevdError::TomlDe {
        file: file.into(),
        e,
    })
}

pub(crate) fn config_from_file(file_path: &Path) -> Result<TomlConfig, MaglevdError> {
    if !file_path.is_file() {
        return Err(MaglevdError::IORead {
            file: file_path.into(),
            e: std::io::Error::new(std::io::ErrorKind::NotFound, "Config file not found"),
        });
    }
    toml_str_to_config(&fs_read(file_path)?, file_path)
}

#[cfg(test)]
mod test_config_files {
    use crate::config::config_files::{TomlConfig, config_from_file, toml_str_to_config};
    use crate::config::{self, SelectorScheme, SystemConfig};
    use googletest::prelude::*;
    use rstest::*;
    use std::path::{Path, PathBuf};

    fn parse(toml_string: &str) -> TomlConfig {
        toml_str_to_config(toml_string, Path::new("test.toml")).expect("failed to parse toml")
    }

    #[gtest]
    fn empty_file_gives_defaults() {
        let resolved: SystemConfig = parse("").into();
        assert_eq!(resolved, SystemConfig::default());
        assert_eq!(resolved.server.listen_addr, config::LISTEN_ADDR);
        assert_eq!(
            resolved.store.socket_path,
            PathBuf::from(config::STORE_SOCKET_PATH)
        );
        assert_eq!(resolved.bitstream.selector, SelectorScheme::Partition);
        assert_eq!(resolved.bitstream.max_partitions, config::MAX_PARTITIONS);
    }

    #[gtest]
    #[rstest]
    #[case::wrapper("[bitstream]\nselector = \"wrapper\"\n", SelectorScheme::Wrapper)]
    #[case::partition("[bitstream]\nselector = \"partition\"\n", SelectorScheme::Partition)]
    #[case::missing("[bitstream]\nmax_partitions = 2\n", SelectorScheme::Partition)]
    fn selector_scheme(#[case] toml_string: &str, #[case] expected: SelectorScheme) {
        let resolved: SystemConfig = parse(toml_string).into();
        assert_eq!(resolved.bitstream.selector, expected);
    }

    #[gtest]
    fn user_overrides_vendor_per_key() {
        let user = parse(
            "[system_paths]\ndevice_handle = \"fpga1\"\n[store]\nsocket_path = \"/run/kv.sock\"\n",
        );
        let vendor = parse(
            "[system_paths]\ndevice_handle = \"fpga0\"\nfirmware_dir = \"/srv/firmware\"\n\
             [bitstream]\nmax_partitions = 8\n",
        );
        let resolved: SystemConfig = user.merge(vendor).into();
        assert_eq!(resolved.system_paths.device_handle, "fpga1");
        assert_eq!(
            resolved.system_paths.firmware_dir,
            PathBuf::from("/srv/firmware")
        );
        assert_eq!(resolved.store.socket_path, PathBuf::from("/run/kv.sock"));
        assert_eq!(resolved.bitstream.max_partitions, 8);
        assert_eq!(
            resolved.system_paths.reconfig_device,
            PathBuf::from(config::RECONFIG_DEVICE)
        );
    }

    #[gtest]
    #[rstest]
    #[case::bad_selector(
        "[bitstream]\nselector = \"both\"\n",
        err(displays_as(contains_substring("MaglevdError::TomlDe:")))
    )]
    #[case::bad_type(
        "[server]\nmax_upload_bytes = \"lots\"\n",
        err(displays_as(contains_substring("MaglevdError::TomlDe:")))
    )]
    fn should_fail<
        M: for<'a> Matcher<&'a std::result::Result<TomlConfig, crate::error::MaglevdError>>,
    >(
        #[case] toml_string: &str,
        #[case] condition: M,
    ) {
        let result = toml_str_to_config(toml_string, Path::new("test.toml"));
        assert_that!(&result, condition);
    }

    #[gtest]
    fn missing_file_is_reported() {
        let result = config_from_file(Path::new("/definitely/not/here.toml"));
        assert_that!(
            &result,
            err(displays_as(contains_substring("Config file not found")))
        );
    }

    #[gtest]
    fn system_paths_helpers() {
        let paths = SystemConfig::default().system_paths;
        assert_eq!(
            paths.fpga_attribute("flags"),
            PathBuf::from("/sys/class/fpga_manager/fpga0/flags")
        );
        assert_eq!(
            paths.decoupler_control(2),
            PathBuf::from("/sys/class/pr_decoupler/decoupler2/decouple")
        );
    }
}
