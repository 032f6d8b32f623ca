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

//! The HTTP control surface.
//!
//! | Path | Method | Handler |
//! |---|---|---|
//! | [`LEVITATION_PATH`] | POST | [`levitation::set_magnetic_levitation`] |
//! | [`LOG_LIST_PATH`] | GET | [`logs::get_log_list`] |
//! | [`LOG_CONTENT_PATH`] | GET (with a JSON body) | [`logs::get_log_content`] |
//! | [`BITSTREAM_PATH`] | POST | [`bitstream::set_fpga_bitstream`] |
//!
//! Failures never produce a structured reply: the error is logged and the client receives an
//! empty `200 OK`. See [`crate::error::MaglevdError`].

pub mod bitstream;
pub mod levitation;
pub mod logs;

use crate::bitstream::BitstreamLoader;
use crate::store::KeyValueStore;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{Method, StatusCode, Uri};
use axum::routing::{get, post};
use log::error;
use std::sync::Arc;

pub static LEVITATION_PATH: &str = "/set_magneti_levitation";
pub static LOG_LIST_PATH: &str = "/get_log_list";
pub static LOG_CONTENT_PATH: &str = "/get_log_content";
pub static BITSTREAM_PATH: &str = "/set_fpga_bitstream";

/// Shared by every handler for the lifetime of the server.
pub struct AppState<S: KeyValueStore> {
    pub store: S,
    pub loader: BitstreamLoader,
}

async fn wrong_method(method: Method, uri: Uri, supported: Method) -> StatusCode {
    error!("{} only supports method {supported}, got {method}", uri.path());
    StatusCode::OK
}

/// Build the router for all endpoints. Request bodies are capped at `max_upload_bytes`.
pub fn router<S: KeyValueStore>(state: Arc<AppState<S>>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route(
            LEVITATION_PATH,
            post(levitation::set_magnetic_levitation::<S>)
                .fallback(|method: Method, uri: Uri| wrong_method(method, uri, Method::POST)),
        )
        .route(
            LOG_LIST_PATH,
            get(logs::get_log_list::<S>)
                .fallback(|method: Method, uri: Uri| wrong_method(method, uri, Method::GET)),
        )
        .route(
            LOG_CONTENT_PATH,
            get(logs::get_log_content::<S>)
                .fallback(|method: Method, uri: Uri| wrong_method(method, uri, Method::GET)),
        )
        .route(
            BITSTREAM_PATH,
            post(bitstream::set_fpga_bitstream::<S>)
                .fallback(|method: Method, uri: Uri| wrong_method(method, uri, Method::POST)),
        )
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}
