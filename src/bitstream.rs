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

//! Bitstream loading.
//!
//! A load runs in two phases:
//! 1. Preparation, concurrent across requests: validate the metadata, stage the upload to a
//!    temporary file and, for wrapped images, convert it with the external converter.
//! 2. Apply, serialized by the loader's apply lock: raise the partial mode and decoupler
//!    signals, make sure the firmware directory exists and hand the image to the hardware.
//!
//! Every signal is held by a [`SignalGuard`] and every temporary file by a
//! [`tempfile::NamedTempFile`], so whichever step fails the inverse signals fire in reverse
//! order, then the lock is released, then the temporary files are removed.

pub mod request;
pub mod signal_guard;
pub mod staging;

use crate::bitstream::request::BitstreamUpload;
use crate::bitstream::signal_guard::{Signal, SignalGuard};
use crate::bitstream::staging::{ConvertedImage, StagedImage};
use crate::config::{BitstreamConfig, SelectorScheme};
use crate::error::MaglevdError;
use crate::hardware::{ApplyTarget, HardwareControlPort, ImageConverter};
use crate::system_io::fs_read_bytes;
use log::{info, trace};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

pub struct BitstreamLoader {
    config: BitstreamConfig,
    port: Arc<dyn HardwareControlPort>,
    converter: Arc<dyn ImageConverter>,
    apply_lock: Mutex<()>,
}

impl BitstreamLoader {
    pub fn new(
        config: BitstreamConfig,
        port: Arc<dyn HardwareControlPort>,
        converter: Arc<dyn ImageConverter>,
    ) -> BitstreamLoader {
        BitstreamLoader {
            config,
            port,
            converter,
            apply_lock: Mutex::new(()),
        }
    }

    pub fn scheme(&self) -> SelectorScheme {
        self.config.selector
    }

    /// Wait for exclusive access to the hardware. Released when the guard is dropped.
    pub async fn apply_lock(&self) -> MutexGuard<'_, ()> {
        trace!("Waiting for the apply lock");
        let guard = self.apply_lock.lock().await;
        trace!("Got the apply lock");
        guard
    }

    fn apply_target(&self) -> ApplyTarget {
        match self.config.selector {
            SelectorScheme::Wrapper => ApplyTarget::FirmwareDir,
            SelectorScheme::Partition => ApplyTarget::CharDevice,
        }
    }

    /// Run the whole load sequence for one upload.
    ///
    /// # Returns: `Result<(), MaglevdError>`
    /// * `Ok(())` - Image applied and every signal lowered again
    /// * `Err(MaglevdError::Argument)` - Partition out of range, nothing was written
    /// * `Err(MaglevdError::IOCreate | IOWrite)` - Staging failed
    /// * `Err(MaglevdError::Converter)` - The external converter failed
    /// * `Err(_)` - A hardware step failed, already raised signals have been lowered
    pub async fn load(&self, upload: BitstreamUpload) -> Result<(), MaglevdError> {
        let request = upload.request;
        request.validate(self.config.max_partitions)?;

        let staged = StagedImage::stage(&self.config.staging_dir, &upload.file_name, &upload.image)?;
        drop(upload.image);
        let converted = if request.needs_conversion() {
            Some(
                ConvertedImage::convert(&self.config.staging_dir, &staged, self.converter.clone())
                    .await?,
            )
        } else {
            None
        };
        let (artifact_path, artifact_name) = match &converted {
            Some(converted) => (converted.path(), converted.name()),
            None => (staged.path(), staged.name()),
        };
        let image = fs_read_bytes(artifact_path)?;

        let _lock = self.apply_lock().await;
        let port = self.port.as_ref();
        let _partial = if request.partial_flag {
            Some(SignalGuard::raise(port, Signal::PartialMode)?)
        } else {
            None
        };
        let _decoupled = match request.decoupled_partition() {
            Some(partition) => Some(SignalGuard::raise(port, Signal::Decouple(partition))?),
            None => None,
        };
        port.ensure_firmware_dir()?;
        port.apply_image(&image, artifact_name, self.apply_target())?;
        info!(
            "Loaded '{artifact_name}' ({} reconfiguration)",
            if request.partial_flag { "partial" } else { "full" }
        );
        Ok(())
    }
}
