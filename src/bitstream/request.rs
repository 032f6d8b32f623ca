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

use crate::config::SelectorScheme;
use crate::error::MaglevdError;
use axum::body::Bytes;
use log::warn;
use serde::Deserialize;

/// File name used when the upload does not carry one.
pub static DEFAULT_IMAGE_NAME: &str = "bitstream";

/// The metadata part as sent by clients, before the configured scheme is applied.
#[derive(Debug, Deserialize)]
struct RawMetadata {
    #[serde(default)]
    partial_flag: bool,
    has_wrapper: Option<bool>,
    partition: Option<u32>,
}

/// Which reconfiguration flavour a request asks for, interpreted under one [`SelectorScheme`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    /// `has_wrapper` requests conversion through the external converter before loading.
    Wrapper { has_wrapper: bool },
    /// `partition`, when present, names the reconfigurable partition to decouple.
    Partition { partition: Option<u32> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitstreamRequest {
    pub partial_flag: bool,
    pub selector: Selector,
}

impl BitstreamRequest {
    /// Decode the JSON metadata part. Fields belonging to the other scheme are ignored with a
    /// warning.
    pub fn from_json(json: &[u8], scheme: SelectorScheme) -> Result<BitstreamRequest, MaglevdError> {
        let raw: RawMetadata = serde_json::from_slice(json).map_err(|e| MaglevdError::Json {
            context: "bitstream metadata".into(),
            e,
        })?;
        let selector = match scheme {
            SelectorScheme::Wrapper => {
                if raw.partition.is_some() {
                    warn!("Ignoring 'partition': this daemon runs the wrapper selector scheme");
                }
                Selector::Wrapper {
                    has_wrapper: raw.has_wrapper.unwrap_or(false),
                }
            }
            SelectorScheme::Partition => {
                if raw.has_wrapper.is_some() {
                    warn!("Ignoring 'has_wrapper': this daemon runs the partition selector scheme");
                }
                Selector::Partition {
                    partition: raw.partition,
                }
            }
        };
        Ok(BitstreamRequest {
            partial_flag: raw.partial_flag,
            selector,
        })
    }

    /// A declared partition must be below `max_partitions`.
    pub fn validate(&self, max_partitions: u32) -> Result<(), MaglevdError> {
        match self.selector {
            Selector::Partition {
                partition: Some(partition),
            } if partition >= max_partitions => Err(MaglevdError::Argument(format!(
                "partition {partition} is out of range, this device has {max_partitions} partitions"
            ))),
            _ => Ok(()),
        }
    }

    /// Partition whose decoupler gates this request, if any. Only partial reconfigurations
    /// are decoupled.
    pub fn decoupled_partition(&self) -> Option<u32> {
        match self.selector {
            Selector::Partition { partition } if self.partial_flag => partition,
            _ => None,
        }
    }

    pub fn needs_conversion(&self) -> bool {
        matches!(self.selector, Selector::Wrapper { has_wrapper: true })
    }
}

/// Everything decoded from a `/set_fpga_bitstream` body.
#[derive(Debug, Clone)]
pub struct BitstreamUpload {
    pub request: BitstreamRequest,
    pub file_name: String,
    pub image: Bytes,
}
