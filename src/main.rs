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

//! Magnetic levitation daemon (maglevd) - HTTP control service for a magnetic levitation rig.
//!
//! The daemon sits between network clients and the rig:
//! - Stores the levitation work mode for the controller to pick up
//! - Lists recorded log periods and serves their contents as downloads
//! - Loads FPGA bitstreams, fully or into one reconfigurable partition
//!
//! # HTTP Service
//!
//! - `POST /set_magneti_levitation` - `{"work_mode": <u8>}`
//! - `GET /get_log_list` - JSON array of period names
//! - `GET /get_log_content` - `{"period_name": "..."}` in the body, replies with `<period>.log`
//! - `POST /set_fpga_bitstream` - multipart upload of JSON metadata and the raw image
//!
//! See [`comm::http`] for the wire details. Failed requests are answered with an empty
//! `200 OK` and reported in the daemon log only.
//!
//! # Security
//!
//! The service has no authentication and no TLS, yet it drives privileged hardware. Only bind
//! it to a trusted network. Putting an authenticating proxy in front of it is required before
//! exposing it any further.
//!
//! # Environment Variables
//!
//! - `RUST_LOG` - Controls logging level (`trace`, `debug`, `info`, `warn`, `error`
//!   or `off`). Defaults to `info`
//!
//! # Architecture
//!
//! Shared state lives in a local key-value store ([`store`]). Bitstream loading
//! ([`bitstream`]) only sequences calls on the traits in [`hardware`], which the daemon backs
//! with sysfs and the `bootgen` converter. Settings come from [`config`].

use crate::bitstream::BitstreamLoader;
use crate::comm::http::{AppState, router};
use crate::config::load_system_config;
use crate::hardware::bootgen::BootgenConverter;
use crate::hardware::sysfs_port::SysfsControlPort;
use crate::store::RedisStore;
use clap::Parser;
use log::{debug, error, info};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

mod bitstream;
mod comm;
mod config;
mod error;
mod hardware;
mod store;
mod system_io;
#[cfg(test)]
mod testing;

#[derive(Parser, Debug)]
#[command(name = "maglevd")]
#[command(bin_name = "maglevd")]
struct Cli {
    #[arg(
        long = "config",
        help = r#"user config file, overriding the vendor config.
Defaults to /etc/maglevd/config.toml
        "#
    )]
    config: Option<PathBuf>,
    #[arg(long = "listen", help = "address to serve HTTP on, e.g. 0.0.0.0:8888")]
    listen: Option<String>,
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutting down maglevd"),
        Err(e) => error!("Failed to listen for ctrl-c, shutting down: {e}"),
    }
}

/// Main entry point for the maglevd daemon.
///
/// Initializes the daemon by:
/// 1. Setting up logging via `env_logger` (defaults to "info" level)
/// 2. Loading the vendor and user config files
/// 3. Building the store client, the hardware port and the bitstream loader
/// 4. Binding the listener and serving until ctrl-c
///
/// # Returns: `Result<(), Box<dyn Error>>`
/// * `Ok(())` - Served until interrupted
/// * `Err(Box<dyn Error>)` - Initialization error (address in use, bad socket path, etc.)
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    debug!("parsed cli arguments {cli:?}");

    let mut config = load_system_config(cli.config.as_deref());
    if let Some(listen) = cli.listen {
        config.server.listen_addr = listen;
    }
    info!(
        "Loading bitstreams with the {} selector scheme",
        config.bitstream.selector
    );

    let store = RedisStore::new(&config.store.socket_path)?;
    let port = Arc::new(SysfsControlPort::new(config.system_paths.clone()));
    let converter = Arc::new(BootgenConverter::new(
        &config.bitstream.converter,
        &config.bitstream.converter_arch,
    ));
    let loader = BitstreamLoader::new(config.bitstream.clone(), port, converter);
    let state = Arc::new(AppState { store, loader });

    let listener = TcpListener::bind(config.server.listen_addr.as_str()).await?;
    info!(
        "Started maglevd http service on {}",
        listener.local_addr()?
    );
    axum::serve(listener, router(state, config.server.max_upload_bytes))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
