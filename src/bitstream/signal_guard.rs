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

use crate::error::MaglevdError;
use crate::hardware::HardwareControlPort;
use log::{error, trace};

/// A hardware signal that has to be lowered again once the apply sequence ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    PartialMode,
    Decouple(u32),
}

/// Scoped hardware signal. Raising it writes the signal, dropping it writes the inverse.
///
/// Guards are dropped in reverse order of declaration, so nested signals are lowered
/// innermost first.
#[must_use = "the signal is lowered as soon as the guard is dropped"]
pub struct SignalGuard<'a> {
    port: &'a dyn HardwareControlPort,
    signal: Signal,
}

impl<'a> SignalGuard<'a> {
    /// The inverse is armed before the forward write, so it also runs when that write fails.
    pub fn raise(
        port: &'a dyn HardwareControlPort,
        signal: Signal,
    ) -> Result<SignalGuard<'a>, MaglevdError> {
        let guard = SignalGuard { port, signal };
        trace!("Raising {signal:?}");
        match signal {
            Signal::PartialMode => port.set_partial_mode()?,
            Signal::Decouple(partition) => port.decouple(partition)?,
        }
        Ok(guard)
    }
}

impl Drop for SignalGuard<'_> {
    fn drop(&mut self) {
        trace!("Lowering {:?}", self.signal);
        let result = match self.signal {
            Signal::PartialMode => self.port.clear_partial_mode(),
            Signal::Decouple(partition) => self.port.recouple(partition),
        };
        if let Err(e) = result {
            error!("Failed to lower {:?}: {e}", self.signal);
        }
    }
}
