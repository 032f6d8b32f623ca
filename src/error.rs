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

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::error;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum MaglevdError {
    #[error("MaglevdError::Argument: {0}")]
    Argument(String),
    #[error("MaglevdError::Body: Failed to read request body: {0}")]
    Body(String),
    #[error("MaglevdError::Json: Failed to decode {context}: {e}")]
    Json {
        context: String,
        e: serde_json::Error,
    },
    #[error("MaglevdError::Multipart: Failed to decode multipart body: {0}")]
    Multipart(String),
    #[error("MaglevdError::Store: Key-value store operation failed: {0}")]
    Store(String),
    #[error("MaglevdError::IORead: An IO error occurred when reading from {file:?}: {e}")]
    IORead { file: PathBuf, e: std::io::Error },
    #[error("MaglevdError::IOWrite: An IO error occurred when writing to {file:?}: {e}")]
    IOWrite { file: PathBuf, e: std::io::Error },
    #[error("MaglevdError::IOCreate: An IO error occurred when creating {file:?}: {e}")]
    IOCreate { file: PathBuf, e: std::io::Error },
    #[error("MaglevdError::Flag: {0}")]
    Flag(String),
    #[error("MaglevdError::FPGAState: FPGA state is not as expected: {0}")]
    FPGAState(String),
    #[error("MaglevdError::Converter: Bitstream conversion failed: {0}")]
    Converter(String),
    #[error("MaglevdError::TomlDe: Failed to parse config {file:?}: {e}")]
    TomlDe { file: PathBuf, e: toml::de::Error },
}

impl From<redis::RedisError> for MaglevdError {
    fn from(e: redis::RedisError) -> Self {
        MaglevdError::Store(e.to_string())
    }
}

impl From<MultipartError> for MaglevdError {
    fn from(e: MultipartError) -> Self {
        MaglevdError::Multipart(e.to_string())
    }
}

/// Failed requests are only reported in the daemon log. The caller gets an empty `200 OK`,
/// which is what existing clients of the control surface expect.
impl IntoResponse for MaglevdError {
    fn into_response(self) -> Response {
        error!("{self}");
        StatusCode::OK.into_response()
    }
}

#[cfg(test)]
mod test_into_response {
    use crate::error::MaglevdError;
    use axum::body::to_bytes;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use googletest::prelude::*;
    use rstest::*;

    #[gtest]
    #[tokio::test]
    #[rstest]
    #[case::argument(MaglevdError::Argument("partition 9 out of range".into()))]
    #[case::store(MaglevdError::Store("connection refused".into()))]
    #[case::converter(MaglevdError::Converter("bootgen exited with 1".into()))]
    async fn error_gives_empty_ok(#[case] err: MaglevdError) {
        let response = err.into_response();
        assert_that!(response.status(), eq(StatusCode::OK));
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("failed to collect body");
        assert_that!(body.len(), eq(0));
    }

    #[gtest]
    fn display_names_variant() {
        let err = MaglevdError::Flag("Parsing flags failed".into());
        assert_that!(&err, displays_as(starts_with("MaglevdError::Flag:")));
    }
}
