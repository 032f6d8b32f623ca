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

use crate::bitstream::request::{BitstreamRequest, BitstreamUpload, DEFAULT_IMAGE_NAME};
use crate::comm::http::AppState;
use crate::config::SelectorScheme;
use crate::error::MaglevdError;
use crate::store::KeyValueStore;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use log::{info, trace, warn};
use std::sync::Arc;

/// Media type of a part, without parameters.
fn essence(content_type: Option<&str>) -> Option<String> {
    content_type
        .and_then(|value| value.split(';').next())
        .map(|value| value.trim().to_ascii_lowercase())
}

/// Collect the metadata part and the image part, in whichever order they arrive.
async fn read_upload(
    multipart: &mut Multipart,
    scheme: SelectorScheme,
) -> Result<BitstreamUpload, MaglevdError> {
    let mut request = None;
    let mut image = None;
    while let Some(field) = multipart.next_field().await? {
        match essence(field.content_type()).as_deref() {
            Some("application/json") => {
                let json = field.bytes().await?;
                request = Some(BitstreamRequest::from_json(&json, scheme)?);
            }
            Some("application/octet-stream") => {
                let file_name = field
                    .file_name()
                    .unwrap_or(DEFAULT_IMAGE_NAME)
                    .to_owned();
                let bytes = field.bytes().await?;
                trace!("Received {} byte image '{file_name}'", bytes.len());
                image = Some((file_name, bytes));
            }
            other => warn!(
                "Ignoring part {:?} with content type {other:?}",
                field.name().unwrap_or_default()
            ),
        }
    }

    let request = request.ok_or_else(|| {
        MaglevdError::Multipart("no application/json part with the bitstream metadata".into())
    })?;
    let (file_name, image) = image.ok_or_else(|| {
        MaglevdError::Multipart("no application/octet-stream part with the bitstream".into())
    })?;
    Ok(BitstreamUpload {
        request,
        file_name,
        image,
    })
}

/// Receive an image and load it. The reply body is empty whatever the outcome.
pub async fn set_fpga_bitstream<S: KeyValueStore>(
    State(state): State<Arc<AppState<S>>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(), MaglevdError> {
    let mut multipart = multipart.map_err(|e| MaglevdError::Multipart(e.to_string()))?;
    let upload = read_upload(&mut multipart, state.loader.scheme()).await?;
    info!(
        "set_fpga_bitstream called with file_name: {}, partial_flag: {} and {:?}",
        upload.file_name, upload.request.partial_flag, upload.request.selector
    );
    state.loader.load(upload).await
}
