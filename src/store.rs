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

//! Key-value store access.
//!
//! The rest of the rig (the levitation controller and the loggers) shares state with maglevd
//! through a local Redis instance:
//! - [`WORK_MODE_KEY`] holds the selected work mode as decimal text
//! - [`TIME_PERIOD_SET_KEY`] is a set naming every recorded log period
//! - each period name is itself the key of a list holding that period's log lines, oldest first
//!
//! Handlers only see the [`KeyValueStore`] trait so the HTTP layer can be exercised against an
//! in-memory store.

use crate::error::MaglevdError;
use log::trace;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use std::future::Future;
use std::path::{Path, PathBuf};

pub static WORK_MODE_KEY: &str = "magnetic_levitation_work_mode";

pub static TIME_PERIOD_SET_KEY: &str = "time_period_set";

/// The store operations needed by the control surface.
pub trait KeyValueStore: Send + Sync + 'static {
    /// Store `value` under `key` without expiry.
    fn set(&self, key: &str, value: &str) -> impl Future<Output = Result<(), MaglevdError>> + Send;

    /// Every member of the set stored under `key`, in no particular order.
    fn set_members(&self, key: &str)
    -> impl Future<Output = Result<Vec<String>, MaglevdError>> + Send;

    fn is_set_member(
        &self,
        key: &str,
        member: &str,
    ) -> impl Future<Output = Result<bool, MaglevdError>> + Send;

    /// The whole list stored under `key`, in stored order.
    fn list_range(&self, key: &str)
    -> impl Future<Output = Result<Vec<String>, MaglevdError>> + Send;
}

/// Redis reached over a Unix domain socket.
///
/// A fresh connection is opened and checked with `PING` for every operation; nothing is
/// pooled between requests.
#[derive(Debug, Clone)]
pub struct RedisStore {
    socket_path: PathBuf,
    client: Client,
}

impl RedisStore {
    pub fn new(socket_path: &Path) -> Result<RedisStore, MaglevdError> {
        let info = ConnectionInfo {
            addr: ConnectionAddr::Unix(socket_path.to_path_buf()),
            redis: RedisConnectionInfo::default(),
        };
        Ok(RedisStore {
            socket_path: socket_path.to_path_buf(),
            client: Client::open(info)?,
        })
    }

    async fn connect(&self) -> Result<MultiplexedConnection, MaglevdError> {
        trace!("Connecting to key-value store at {:?}", self.socket_path);
        let mut con = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| {
                MaglevdError::Store(format!(
                    "connect to {:?} failed: {e}",
                    self.socket_path
                ))
            })?;
        let pong: String = redis::cmd("PING").query_async(&mut con).await?;
        trace!("Store answered {pong}");
        Ok(con)
    }
}

impl KeyValueStore for RedisStore {
    async fn set(&self, key: &str, value: &str) -> Result<(), MaglevdError> {
        let mut con = self.connect().await?;
        let _: () = con.set(key, value).await?;
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, MaglevdError> {
        let mut con = self.connect().await?;
        Ok(con.smembers(key).await?)
    }

    async fn is_set_member(&self, key: &str, member: &str) -> Result<bool, MaglevdError> {
        let mut con = self.connect().await?;
        Ok(con.sismember(key, member).await?)
    }

    async fn list_range(&self, key: &str) -> Result<Vec<String>, MaglevdError> {
        let mut con = self.connect().await?;
        Ok(con.lrange(key, 0, -1).await?)
    }
}
