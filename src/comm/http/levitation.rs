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

use crate::comm::http::AppState;
use crate::error::MaglevdError;
use crate::store::{KeyValueStore, WORK_MODE_KEY};
use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::extract::rejection::BytesRejection;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Operating mode of the levitation controller. Other components read it back from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct WorkMode(pub u8);

impl WorkMode {
    pub const ADJUSTED_LEVITATION: WorkMode = WorkMode(0);
    pub const UNADJUSTED_LEVITATION: WorkMode = WorkMode(1);
    pub const OSCILLATION: WorkMode = WorkMode(2);

    pub fn name(&self) -> Option<&'static str> {
        match *self {
            WorkMode::ADJUSTED_LEVITATION => Some("adjusted levitation"),
            WorkMode::UNADJUSTED_LEVITATION => Some("unadjusted levitation"),
            WorkMode::OSCILLATION => Some("oscillation"),
            _ => None,
        }
    }
}

impl fmt::Display for WorkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Deserialize)]
struct SetWorkMode {
    work_mode: WorkMode,
}

#[derive(Debug, Serialize)]
pub struct Reply {
    result: &'static str,
}

impl Reply {
    pub fn success() -> Reply {
        Reply { result: "success" }
    }
}

/// Persist the requested work mode.
///
/// Values outside the named modes are stored unchanged; the controller decides what to make
/// of them.
pub async fn set_magnetic_levitation<S: KeyValueStore>(
    State(state): State<Arc<AppState<S>>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<Reply>, MaglevdError> {
    let body = body.map_err(|e| MaglevdError::Body(e.to_string()))?;
    let SetWorkMode { work_mode } =
        serde_json::from_slice(&body).map_err(|e| MaglevdError::Json {
            context: "work mode".into(),
            e,
        })?;
    match work_mode.name() {
        Some(name) => info!("set_magnetic_levitation called with work_mode: {work_mode} ({name})"),
        None => warn!(
            "set_magnetic_levitation called with work_mode: {work_mode}, which is none of the \
             known modes"
        ),
    }
    state
        .store
        .set(WORK_MODE_KEY, &work_mode.to_string())
        .await?;
    Ok(Json(Reply::success()))
}
