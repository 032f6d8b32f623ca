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

//! In-memory stand-ins for the store, the hardware and the converter, and helpers to drive
//! the router with them.

use crate::bitstream::BitstreamLoader;
use crate::comm::http::{AppState, BITSTREAM_PATH, router};
use crate::config::{SelectorScheme, SystemConfig, SystemPaths};
use crate::error::MaglevdError;
use crate::hardware::{ApplyTarget, HardwareControlPort, ImageConverter};
use crate::store::KeyValueStore;
use axum::Router;
use axum::body::{Body, Bytes, to_bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

static BOUNDARY: &str = "maglevd-test-boundary";

/// Router over `store`, a [`RecordingPort`] and a converter producing `converted`, staging
/// into a fresh directory. The partition scheme is used.
pub fn test_router(store: MemoryStore) -> (Router, Arc<RecordingPort>, TempDir) {
    test_router_with(store, SelectorScheme::Partition)
}

pub fn test_router_with(
    store: MemoryStore,
    scheme: SelectorScheme,
) -> (Router, Arc<RecordingPort>, TempDir) {
    let staging = tempfile::tempdir().expect("failed to create tempdir");
    let port = Arc::new(RecordingPort::new());
    let config = SystemConfig::default();
    let mut bitstream = config.bitstream;
    bitstream.selector = scheme;
    bitstream.staging_dir = staging.path().to_path_buf();
    let loader = BitstreamLoader::new(
        bitstream,
        port.clone(),
        Arc::new(FakeConverter::producing(b"converted")),
    );
    let state = Arc::new(AppState { store, loader });
    (
        router(state, config.server.max_upload_bytes),
        port,
        staging,
    )
}

/// Run one request through `router` and collect the whole reply.
pub async fn send(router: Router, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
    let response = router.oneshot(request).await.expect("router failed");
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to collect body");
    (status, headers, body)
}

/// One part of a hand-built `multipart/form-data` body.
#[derive(Debug, Clone)]
pub struct MultipartPart {
    pub name: &'static str,
    pub file_name: Option<&'static str>,
    pub content_type: &'static str,
    pub data: Vec<u8>,
}

/// POST to the bitstream endpoint carrying `parts` in order.
pub fn multipart_request(parts: &[MultipartPart]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", part.name);
        if let Some(file_name) = part.file_name {
            disposition.push_str(&format!("; filename=\"{file_name}\""));
        }
        body.extend_from_slice(format!("{disposition}\r\n").as_bytes());
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", part.content_type).as_bytes());
        body.extend_from_slice(&part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    Request::builder()
        .method("POST")
        .uri(BITSTREAM_PATH)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("failed to build request")
}

/// Sorted names of everything inside `dir`.
pub fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("failed to list dir")
        .map(|entry| {
            entry
                .expect("failed to read dir entry")
                .file_name()
                .to_string_lossy()
                .into_owned()
        })
        .collect();
    names.sort();
    names
}

/// Lays out a miniature sysfs: one fpga_manager device, two decouplers and a
/// reconfiguration "device" that is a plain file. The firmware dir is not created.
pub fn fake_sysfs(state: &str) -> (TempDir, SystemPaths) {
    let root = tempfile::tempdir().expect("failed to create tempdir");
    let mut paths = SystemConfig::default().system_paths;
    paths.fpga_managers_dir = root.path().join("sys/class/fpga_manager");
    paths.firmware_dir = root.path().join("lib/firmware");
    paths.reconfig_device = root.path().join("dev/xdevcfg");
    paths.decoupler_dir = root.path().join("sys/class/pr_decoupler");

    let device = paths.fpga_managers_dir.join(&paths.device_handle);
    fs::create_dir_all(&device).expect("failed to create device dir");
    fs::write(device.join("flags"), "0x0\n").expect("failed to write flags");
    fs::write(device.join("state"), format!("{state}\n")).expect("failed to write state");
    fs::write(device.join("firmware"), "").expect("failed to write firmware");
    for partition in 0..2 {
        let control = paths.decoupler_control(partition);
        fs::create_dir_all(control.parent().expect("no parent"))
            .expect("failed to create decoupler dir");
        fs::write(&control, "0").expect("failed to write decoupler");
    }
    fs::create_dir_all(root.path().join("dev")).expect("failed to create dev dir");
    fs::write(&paths.reconfig_device, "").expect("failed to create device file");
    (root, paths)
}

#[derive(Debug, Default)]
struct StoreData {
    strings: HashMap<String, String>,
    sets: HashMap<String, BTreeSet<String>>,
    lists: HashMap<String, Vec<String>>,
}

/// [`KeyValueStore`] held in a map. Clones share their contents. An unreachable store fails
/// every operation.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Arc<Mutex<StoreData>>,
    unreachable: bool,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    pub fn unreachable() -> MemoryStore {
        MemoryStore {
            unreachable: true,
            ..MemoryStore::default()
        }
    }

    pub fn with_set(self, key: &str, members: &[&str]) -> MemoryStore {
        self.data
            .lock()
            .expect("store poisoned")
            .sets
            .insert(key.into(), members.iter().map(|m| m.to_string()).collect());
        self
    }

    pub fn with_list(self, key: &str, items: &[&str]) -> MemoryStore {
        self.data
            .lock()
            .expect("store poisoned")
            .lists
            .insert(key.into(), items.iter().map(|i| i.to_string()).collect());
        self
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.data
            .lock()
            .expect("store poisoned")
            .strings
            .get(key)
            .cloned()
    }

    fn check(&self) -> Result<(), MaglevdError> {
        if self.unreachable {
            Err(MaglevdError::Store("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

impl KeyValueStore for MemoryStore {
    async fn set(&self, key: &str, value: &str) -> Result<(), MaglevdError> {
        self.check()?;
        self.data
            .lock()
            .expect("store poisoned")
            .strings
            .insert(key.into(), value.into());
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, MaglevdError> {
        self.check()?;
        let data = self.data.lock().expect("store poisoned");
        Ok(data
            .sets
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn is_set_member(&self, key: &str, member: &str) -> Result<bool, MaglevdError> {
        self.check()?;
        let data = self.data.lock().expect("store poisoned");
        Ok(data.sets.get(key).is_some_and(|set| set.contains(member)))
    }

    async fn list_range(&self, key: &str) -> Result<Vec<String>, MaglevdError> {
        self.check()?;
        let data = self.data.lock().expect("store poisoned");
        Ok(data.lists.get(key).cloned().unwrap_or_default())
    }
}

/// One call made on a [`RecordingPort`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortEvent {
    SetPartialMode,
    ClearPartialMode,
    Decouple(u32),
    Recouple(u32),
    EnsureFirmwareDir,
    Apply {
        image: Vec<u8>,
        name: String,
        target: ApplyTarget,
    },
}

/// [`HardwareControlPort`] recording every call, failing the ones it is told to fail.
#[derive(Debug, Default)]
pub struct RecordingPort {
    events: Mutex<Vec<PortEvent>>,
    failing: Vec<PortEvent>,
    fail_apply: bool,
    apply_delay: Option<Duration>,
}

impl RecordingPort {
    pub fn new() -> RecordingPort {
        RecordingPort::default()
    }

    pub fn failing_on(mut self, event: PortEvent) -> RecordingPort {
        self.failing.push(event);
        self
    }

    pub fn failing_apply(mut self) -> RecordingPort {
        self.fail_apply = true;
        self
    }

    /// Blocks inside every apply, widening the window for interleaving.
    pub fn with_apply_delay(mut self, delay: Duration) -> RecordingPort {
        self.apply_delay = Some(delay);
        self
    }

    pub fn events(&self) -> Vec<PortEvent> {
        self.events.lock().expect("events poisoned").clone()
    }

    fn record(&self, event: PortEvent) -> Result<(), MaglevdError> {
        let fails = self.failing.contains(&event)
            || (self.fail_apply && matches!(event, PortEvent::Apply { .. }));
        let message = format!("{event:?} failed");
        self.events.lock().expect("events poisoned").push(event);
        if fails {
            Err(MaglevdError::IOWrite {
                file: "/dev/fake".into(),
                e: std::io::Error::other(message),
            })
        } else {
            Ok(())
        }
    }
}

impl HardwareControlPort for RecordingPort {
    fn set_partial_mode(&self) -> Result<(), MaglevdError> {
        self.record(PortEvent::SetPartialMode)
    }

    fn clear_partial_mode(&self) -> Result<(), MaglevdError> {
        self.record(PortEvent::ClearPartialMode)
    }

    fn decouple(&self, partition: u32) -> Result<(), MaglevdError> {
        self.record(PortEvent::Decouple(partition))
    }

    fn recouple(&self, partition: u32) -> Result<(), MaglevdError> {
        self.record(PortEvent::Recouple(partition))
    }

    fn ensure_firmware_dir(&self) -> Result<(), MaglevdError> {
        self.record(PortEvent::EnsureFirmwareDir)
    }

    fn apply_image(
        &self,
        image: &[u8],
        name: &str,
        target: ApplyTarget,
    ) -> Result<(), MaglevdError> {
        if let Some(delay) = self.apply_delay {
            std::thread::sleep(delay);
        }
        self.record(PortEvent::Apply {
            image: image.to_vec(),
            name: name.into(),
            target,
        })
    }
}

/// [`ImageConverter`] that writes fixed bytes to the output and remembers each descriptor.
#[derive(Debug)]
pub struct FakeConverter {
    output: Option<Vec<u8>>,
    delay: Option<Duration>,
    descriptors: Mutex<Vec<String>>,
}

impl FakeConverter {
    pub fn producing(output: &[u8]) -> FakeConverter {
        FakeConverter {
            output: Some(output.to_vec()),
            delay: None,
            descriptors: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> FakeConverter {
        FakeConverter {
            output: None,
            delay: None,
            descriptors: Mutex::new(Vec::new()),
        }
    }

    /// Blocks the calling thread for `delay` inside every conversion.
    pub fn with_delay(mut self, delay: Duration) -> FakeConverter {
        self.delay = Some(delay);
        self
    }

    pub fn descriptors(&self) -> Vec<String> {
        self.descriptors.lock().expect("descriptors poisoned").clone()
    }
}

impl ImageConverter for FakeConverter {
    fn convert(&self, descriptor: &Path, output: &Path) -> Result<(), MaglevdError> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        let text = fs::read_to_string(descriptor).expect("failed to read descriptor");
        self.descriptors
            .lock()
            .expect("descriptors poisoned")
            .push(text);
        match &self.output {
            Some(bytes) => {
                fs::write(output, bytes).expect("failed to write output");
                Ok(())
            }
            None => Err(MaglevdError::Converter("fake converter exited with 1".into())),
        }
    }
}
