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

//! Error Wrapping File System I/O Helpers
//!
//! Thin wrappers around the standard library file operations used to drive sysfs attributes,
//! the reconfiguration device and the firmware directory. Every helper logs at `trace` level
//! and maps failures to a [`MaglevdError`] variant carrying the offending path.
//!
//! # Examples
//!
//! ```rust,no_run
//! # use maglevd::error::MaglevdError;
//! # use maglevd::system_io::{fs_read, fs_write};
//! # use std::path::Path;
//! # fn example() -> Result<(), MaglevdError> {
//! let state = fs_read(Path::new("/sys/class/fpga_manager/fpga0/state"))?;
//! fs_write(Path::new("/sys/class/fpga_manager/fpga0/flags"), false, "0x1")?;
//! # Ok(())
//! # }
//! ```

use crate::error::MaglevdError;
use log::trace;
use std::fs::{OpenOptions, create_dir_all};
use std::io::{Read, Write};
use std::path::Path;
use tempfile::{Builder, NamedTempFile};

/// Read the contents of a file to a String.
///
/// # Returns: `Result<String, MaglevdError>`
/// * `Ok(String)` - The complete contents of the file
/// * `Err(MaglevdError::IORead)` - If the file cannot be read
pub fn fs_read(file_path: &Path) -> Result<String, MaglevdError> {
    trace!("Attempting to read from {file_path:?}");
    let mut buf: String = String::new();
    let result = OpenOptions::new()
        .read(true)
        .open(file_path)
        .and_then(|mut f| f.read_to_string(&mut buf));

    match result {
        Ok(_) => {
            trace!("Reading done");
            Ok(buf)
        }
        Err(e) => Err(MaglevdError::IORead {
            file: file_path.into(),
            e,
        }),
    }
}

/// Read the raw contents of a file.
///
/// Used to pick up a staged or converted bitstream just before it is handed to the
/// hardware port.
pub fn fs_read_bytes(file_path: &Path) -> Result<Vec<u8>, MaglevdError> {
    trace!("Attempting to read bytes from {file_path:?}");
    let mut buf = Vec::new();
    let result = OpenOptions::new()
        .read(true)
        .open(file_path)
        .and_then(|mut f| f.read_to_end(&mut buf));

    match result {
        Ok(n) => {
            trace!("Read {n} bytes");
            Ok(buf)
        }
        Err(e) => Err(MaglevdError::IORead {
            file: file_path.into(),
            e,
        }),
    }
}

/// Write a string value to a file.
///
/// # Arguments
///
/// * `file_path` - Path to the file to write
/// * `create` - If `true`, create the file if it doesn't exist; if `false`, file must already exist
/// * `value` - The string value to write
///
/// # Returns: `Result<(), MaglevdError>`
/// * `Ok(())` - Write succeeded
/// * `Err(MaglevdError::IOWrite)` - If the write fails (permissions, file doesn't exist when create=false, etc.)
pub fn fs_write(file_path: &Path, create: bool, value: impl AsRef<str>) -> Result<(), MaglevdError> {
    trace!(
        "Attempting to write {:?} to {:?}",
        value.as_ref(),
        file_path
    );
    let result = OpenOptions::new()
        .create(create)
        .read(false)
        .write(true)
        .open(file_path)
        .and_then(|mut f| write!(f, "{}", value.as_ref()));
    match result {
        Ok(_) => {
            trace!("Write done.");
            Ok(())
        }
        Err(e) => Err(MaglevdError::IOWrite {
            file: file_path.into(),
            e,
        }),
    }
}

/// Write binary data to a file, truncating whatever was there before.
///
/// # Arguments
///
/// * `file_path` - Path to the file to write
/// * `create` - If `true`, create the file if it doesn't exist; if `false`, file must already exist
///   (character devices are never created)
/// * `data` - The binary data to write
pub fn fs_write_bytes(file_path: &Path, create: bool, data: &[u8]) -> Result<(), MaglevdError> {
    trace!("Attempting to write {} bytes to {file_path:?}", data.len());
    let result = OpenOptions::new()
        .create(create)
        .write(true)
        .truncate(create)
        .open(file_path)
        .and_then(|mut f| f.write_all(data));

    match result {
        Ok(_) => {
            trace!("Write done.");
            Ok(())
        }
        Err(e) => Err(MaglevdError::IOWrite {
            file: file_path.into(),
            e,
        }),
    }
}

/// Create a file named `<prefix><random><suffix>` inside `dir`, deleted when dropped.
///
/// # Returns: `Result<NamedTempFile, MaglevdError>`
/// * `Ok(NamedTempFile)` - The new, empty file
/// * `Err(MaglevdError::IOCreate)` - If `dir` is missing or not writable
pub fn fs_create_temp(dir: &Path, prefix: &str, suffix: &str) -> Result<NamedTempFile, MaglevdError> {
    trace!("Attempting to create {prefix}*{suffix} in {dir:?}");
    Builder::new()
        .prefix(prefix)
        .suffix(suffix)
        .tempfile_in(dir)
        .map_err(|e| MaglevdError::IOCreate {
            file: dir.join(format!("{prefix}*{suffix}")),
            e,
        })
}

/// Write `data` to a temporary file and flush it to disk before anything else opens it.
pub fn fs_write_synced(file: &mut NamedTempFile, data: &[u8]) -> Result<(), MaglevdError> {
    trace!("Attempting to write {} bytes to {:?}", data.len(), file.path());
    file.write_all(data)
        .and_then(|_| file.as_file().sync_all())
        .map_err(|e| MaglevdError::IOWrite {
            file: file.path().into(),
            e,
        })
}

/// Recursively create directories up to the specified path.
///
/// Succeeds if the directory already exists.
///
/// # Returns: `Result<(), MaglevdError>`
/// * `Ok(())` - Directory created (or already existed)
/// * `Err(MaglevdError::IOCreate)` - If directory creation fails
pub fn fs_create_dir(path: &Path) -> Result<(), MaglevdError> {
    trace!("Attempting to Create '{path:?}'");
    let result = create_dir_all(path);
    match result {
        Ok(_) => {
            trace!("Directory created at {path:?}.");
            Ok(())
        }
        Err(e) => Err(MaglevdError::IOCreate {
            file: path.into(),
            e,
        }),
    }
}
