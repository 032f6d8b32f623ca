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

//! sysfs backed [`HardwareControlPort`].
//!
//! Of the fpga_manager attributes of the configured device only these are touched:
//! - `state` - Current FPGA state (operating, unknown, write error, etc.)
//! - `flags` - Programming flags (hexadecimal format: "0x...")
//! - `firmware` - Trigger bitstream loading by writing a file name relative to the firmware dir
//!
//! Images bound for the firmware directory are written under a fresh `maglevd-*.bin` name and
//! removed once the load returns. Existing firmware files are never opened.
//!
//! Decouplers are driven through `<decoupler_dir>/decoupler<N>/decouple`, `1` isolating the
//! partition and `0` reconnecting it.

use crate::config::SystemPaths;
use crate::error::MaglevdError;
use crate::hardware::{ApplyTarget, HardwareControlPort};
use crate::system_io::{
    fs_create_dir, fs_create_temp, fs_read, fs_write, fs_write_bytes, fs_write_synced,
};
use log::{info, trace, warn};

/// fpga_manager flag requesting partial reconfiguration.
pub const PARTIAL_RECONFIG_FLAG: u32 = 0x1;

/// Prefix of the transient images written to the firmware directory.
pub const FIRMWARE_PREFIX: &str = "maglevd-";

#[derive(Debug)]
pub struct SysfsControlPort {
    paths: SystemPaths,
}

impl SysfsControlPort {
    pub fn new(paths: SystemPaths) -> SysfsControlPort {
        SysfsControlPort { paths }
    }

    pub(crate) fn state(&self) -> Result<String, MaglevdError> {
        let state_path = self.paths.fpga_attribute("state");
        trace!("reading {state_path:?}");
        fs_read(&state_path).map(|s| s.trim_end_matches('\n').to_string())
    }

    pub(crate) fn flags(&self) -> Result<u32, MaglevdError> {
        let contents = fs_read(&self.paths.fpga_attribute("flags"))?;
        let trimmed = contents.trim().trim_start_matches("0x");
        u32::from_str_radix(trimmed, 16)
            .map_err(|_| MaglevdError::Flag(format!("Parsing flags '{trimmed}' failed")))
    }

    /// Writes `flags` and verifies that the write succeeded by reading the value back.
    fn set_flags(&self, flags: u32) -> Result<(), MaglevdError> {
        let flag_path = self.paths.fpga_attribute("flags");
        trace!("Writing 0x'{flags:X}' to '{flag_path:?}");
        fs_write(&flag_path, false, format!("0x{flags:X}"))?;

        match self.flags() {
            Ok(returned_flags) if returned_flags == flags => Ok(()),
            Ok(returned_flags) => Err(MaglevdError::Flag(format!(
                "Setting {}'s flags to '{}' failed. Resulting flag was '{}'",
                self.paths.device_handle, flags, returned_flags
            ))),
            Err(e) => Err(MaglevdError::Flag(format!(
                "Failed to read {}'s flags after setting to '{}': {}",
                self.paths.device_handle, flags, e
            ))),
        }
    }

    fn assert_state(&self) -> Result<(), MaglevdError> {
        let state = self.state()?;
        match state.as_str() {
            "operating" => {
                info!("{}'s state is 'operating'", self.paths.device_handle);
                Ok(())
            }
            _ => Err(MaglevdError::FPGAState(format!(
                "After loading bitstream, {}'s state should be 'operating' but it is '{}'",
                self.paths.device_handle, state
            ))),
        }
    }

    fn write_decoupler(&self, partition: u32, value: &str) -> Result<(), MaglevdError> {
        let control = self.paths.decoupler_control(partition);
        trace!("Writing '{value}' to decoupler {control:?}");
        fs_write(&control, false, value)
    }

    /// The transient image is deleted when this returns, whether the load worked or not.
    fn load_firmware(&self, image: &[u8], name: &str) -> Result<(), MaglevdError> {
        let mut firmware = fs_create_temp(&self.paths.firmware_dir, FIRMWARE_PREFIX, ".bin")?;
        fs_write_synced(&mut firmware, image)?;
        let file_name = firmware
            .path()
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .ok_or_else(|| MaglevdError::IOCreate {
                file: firmware.path().into(),
                e: std::io::Error::other("temporary firmware file has no name"),
            })?;
        trace!("Loading '{name}' as {file_name}");
        fs_write(&self.paths.fpga_attribute("firmware"), false, &file_name)?;
        self.assert_state()
    }
}

impl HardwareControlPort for SysfsControlPort {
    fn set_partial_mode(&self) -> Result<(), MaglevdError> {
        self.set_flags(PARTIAL_RECONFIG_FLAG)
    }

    fn clear_partial_mode(&self) -> Result<(), MaglevdError> {
        self.set_flags(0)
    }

    fn decouple(&self, partition: u32) -> Result<(), MaglevdError> {
        self.write_decoupler(partition, "1")
    }

    fn recouple(&self, partition: u32) -> Result<(), MaglevdError> {
        self.write_decoupler(partition, "0")
    }

    fn ensure_firmware_dir(&self) -> Result<(), MaglevdError> {
        fs_create_dir(&self.paths.firmware_dir)
    }

    fn apply_image(
        &self,
        image: &[u8],
        name: &str,
        target: ApplyTarget,
    ) -> Result<(), MaglevdError> {
        info!(
            "Applying {} byte image '{name}' to {}",
            image.len(),
            self.paths.device_handle
        );
        match target {
            ApplyTarget::FirmwareDir => self.load_firmware(image, name),
            ApplyTarget::CharDevice => {
                if !self.paths.reconfig_device.exists() {
                    warn!(
                        "Reconfiguration device {:?} does not exist",
                        self.paths.reconfig_device
                    );
                }
                fs_write_bytes(&self.paths.reconfig_device, false, image)
            }
        }
    }
}
