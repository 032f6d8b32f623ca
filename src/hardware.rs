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

//! Hardware control abstraction.
//!
//! Everything that touches privileged interfaces during a reconfiguration goes through one of
//! two traits:
//! - [`HardwareControlPort`] - fpga_manager flags, partition decouplers, the firmware directory
//!   and the reconfiguration interfaces
//! - [`ImageConverter`] - the external tool that packages a raw image into a loadable binary
//!
//! The bitstream loader only sequences calls on these traits. [`sysfs_port::SysfsControlPort`]
//! and [`bootgen::BootgenConverter`] are the implementations used on the target.

pub mod bootgen;
pub mod sysfs_port;

use crate::error::MaglevdError;
use std::path::Path;

/// Where [`HardwareControlPort::apply_image`] sends an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyTarget {
    /// Copy into the firmware directory under a transient name and ask the fpga_manager to
    /// load it. The copy is removed afterwards.
    FirmwareDir,
    /// Stream the raw bytes into the reconfiguration character device.
    CharDevice,
}

/// Trait for the privileged side effects of a reconfiguration.
///
/// Implementations must be callable from any request task, hence `Send + Sync`. Calls are
/// blocking and are only made while the loader holds its apply lock.
pub trait HardwareControlPort: Send + Sync {
    /// Switch the FPGA manager into partial reconfiguration mode.
    ///
    /// # Returns: `Result<(), MaglevdError>`
    /// * `Ok(())` - Flag written and read back
    /// * `Err(MaglevdError::IOWrite)` - Failed to write the flags attribute
    /// * `Err(MaglevdError::Flag)` - Read-back value doesn't match
    fn set_partial_mode(&self) -> Result<(), MaglevdError>;

    /// Inverse of [`HardwareControlPort::set_partial_mode`].
    fn clear_partial_mode(&self) -> Result<(), MaglevdError>;

    /// Isolate a reconfigurable partition from the static logic.
    fn decouple(&self, partition: u32) -> Result<(), MaglevdError>;

    /// Inverse of [`HardwareControlPort::decouple`].
    fn recouple(&self, partition: u32) -> Result<(), MaglevdError>;

    /// Create the firmware directory if it does not exist yet.
    fn ensure_firmware_dir(&self) -> Result<(), MaglevdError>;

    /// Hand an image to the hardware, triggering the reconfiguration.
    ///
    /// # Arguments
    ///
    /// * `image` - The complete bitstream
    /// * `name` - Name of the uploaded artifact, for logging only
    /// * `target` - Which interface receives the image
    fn apply_image(&self, image: &[u8], name: &str, target: ApplyTarget)
    -> Result<(), MaglevdError>;
}

/// Trait for turning a boot image descriptor into a loadable binary.
pub trait ImageConverter: Send + Sync {
    /// Convert the image described by `descriptor` into `output`, overwriting it.
    ///
    /// Blocking. The loader calls it from tokio's blocking pool.
    fn convert(&self, descriptor: &Path, output: &Path) -> Result<(), MaglevdError>;
}
