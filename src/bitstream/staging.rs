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

//! Temporary on-disk artifacts of an upload.
//!
//! Each artifact owns a [`NamedTempFile`] with a unique name in the staging directory, so
//! concurrent uploads never collide and the file is deleted when the artifact is dropped.

use crate::bitstream::request::DEFAULT_IMAGE_NAME;
use crate::error::MaglevdError;
use crate::hardware::ImageConverter;
use crate::system_io::{fs_create_temp, fs_write_synced};
use log::trace;
use std::path::Path;
use std::sync::Arc;
use tempfile::NamedTempFile;

/// `image.bit` stays `image.bit`, `../../etc/passwd` becomes `passwd`.
pub(crate) fn sanitize_file_name(name: &str) -> String {
    Path::new(name)
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .filter(|f| !f.is_empty())
        .unwrap_or_else(|| DEFAULT_IMAGE_NAME.to_string())
}

/// Text of a single-image boot image descriptor referencing `image`.
pub(crate) fn boot_image_descriptor(image: &Path) -> String {
    format!("all:{{\n\t {} \n}}", image.display())
}

/// The uploaded image, written and synced to the staging directory.
#[derive(Debug)]
pub struct StagedImage {
    file: NamedTempFile,
    name: String,
}

impl StagedImage {
    pub fn stage(dir: &Path, file_name: &str, image: &[u8]) -> Result<StagedImage, MaglevdError> {
        let name = sanitize_file_name(file_name);
        let mut file = fs_create_temp(dir, &name, "")?;
        fs_write_synced(&mut file, image)?;
        trace!("Staged {} bytes at {:?}", image.len(), file.path());
        Ok(StagedImage { file, name })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Output of the external converter together with the descriptor that produced it.
#[derive(Debug)]
pub struct ConvertedImage {
    // removed together with `output`
    _descriptor: NamedTempFile,
    output: NamedTempFile,
    name: String,
}

impl ConvertedImage {
    /// The converter runs on tokio's blocking pool.
    pub async fn convert(
        dir: &Path,
        staged: &StagedImage,
        converter: Arc<dyn ImageConverter>,
    ) -> Result<ConvertedImage, MaglevdError> {
        let mut descriptor = fs_create_temp(dir, "bitstream", ".bif")?;
        fs_write_synced(
            &mut descriptor,
            boot_image_descriptor(staged.path()).as_bytes(),
        )?;

        let name = format!("{}.bin", staged.name());
        let output = fs_create_temp(dir, &name, "")?;
        let descriptor_path = descriptor.path().to_path_buf();
        let output_path = output.path().to_path_buf();
        tokio::task::spawn_blocking(move || converter.convert(&descriptor_path, &output_path))
            .await
            .map_err(|e| MaglevdError::Converter(format!("conversion task failed: {e}")))??;
        trace!("Converted {:?} into {:?}", staged.path(), output.path());
        Ok(ConvertedImage {
            _descriptor: descriptor,
            output,
            name,
        })
    }

    pub fn path(&self) -> &Path {
        self.output.path()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
