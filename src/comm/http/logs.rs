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

//! Recorded log periods.
//!
//! The period name arrives in the body of a GET. Clients in the field send it that way, so it
//! is read from the body rather than from the query string.

use crate::comm::http::AppState;
use crate::error::MaglevdError;
use crate::store::{KeyValueStore, TIME_PERIOD_SET_KEY};
use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::extract::rejection::BytesRejection;
use axum::http::HeaderValue;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use log::{info, trace};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct LogContentRequest {
    period_name: String,
}

pub async fn get_log_list<S: KeyValueStore>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<String>>, MaglevdError> {
    info!("get_log_list called");
    let periods = state.store.set_members(TIME_PERIOD_SET_KEY).await?;
    trace!("Found {} log periods", periods.len());
    Ok(Json(periods))
}

/// Every line of `lines` followed by CRLF.
pub(crate) fn crlf_lines(lines: &[String]) -> String {
    lines.iter().map(|line| format!("{line}\r\n")).collect()
}

/// `Content-Disposition` naming `<period_name>.log`. Names that would need quoting are refused.
fn attachment(period_name: &str) -> Result<HeaderValue, MaglevdError> {
    if period_name.contains(['"', '\\']) {
        return Err(MaglevdError::Argument(format!(
            "'{period_name}' cannot be used as an attachment file name"
        )));
    }
    HeaderValue::from_str(&format!("attachment; filename=\"{period_name}.log\"")).map_err(|_| {
        MaglevdError::Argument(format!(
            "'{period_name}' cannot be used as an attachment file name"
        ))
    })
}

/// Download the lines recorded for one period as `<period>.log`.
pub async fn get_log_content<S: KeyValueStore>(
    State(state): State<Arc<AppState<S>>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, MaglevdError> {
    let body = body.map_err(|e| MaglevdError::Body(e.to_string()))?;
    let LogContentRequest { period_name } =
        serde_json::from_slice(&body).map_err(|e| MaglevdError::Json {
            context: "log content request".into(),
            e,
        })?;
    info!("get_log_content called with period_name: {period_name}");

    if !state
        .store
        .is_set_member(TIME_PERIOD_SET_KEY, &period_name)
        .await?
    {
        return Err(MaglevdError::Argument(format!(
            "'{period_name}' is not a known log period"
        )));
    }
    let disposition = attachment(&period_name)?;
    let lines = state.store.list_range(&period_name).await?;
    trace!("Sending {} lines for {period_name}", lines.len());
    Ok((
        [
            (CONTENT_TYPE, HeaderValue::from_static("text/plain")),
            (CONTENT_DISPOSITION, disposition),
        ],
        crlf_lines(&lines),
    )
        .into_response())
}
