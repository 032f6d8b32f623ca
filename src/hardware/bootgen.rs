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
use crate::hardware::ImageConverter;
use log::{debug, trace};
use std::path::Path;
use std::process::Command;

/// Runs Xilinx `bootgen` to turn a `.bif` descriptor into a loadable `.bin`.
#[derive(Debug, Clone)]
pub struct BootgenConverter {
    program: String,
    arch: String,
}

impl BootgenConverter {
    pub fn new(program: &str, arch: &str) -> BootgenConverter {
        BootgenConverter {
            program: program.to_owned(),
            arch: arch.to_owned(),
        }
    }
}

impl ImageConverter for BootgenConverter {
    fn convert(&self, descriptor: &Path, output: &Path) -> Result<(), MaglevdError> {
        trace!(
            "Running {} -image {descriptor:?} -arch {} -o {output:?} -w",
            self.program, self.arch
        );
        let result = Command::new(&self.program)
            .arg("-image")
            .arg(descriptor)
            .arg("-arch")
            .arg(&self.arch)
            .arg("-o")
            .arg(output)
            .arg("-w")
            .output()
            .map_err(|e| MaglevdError::Converter(format!("failed to run {}: {e}", self.program)))?;
        if result.status.success() {
            debug!("{}", String::from_utf8_lossy(&result.stdout));
            Ok(())
        } else {
            Err(MaglevdError::Converter(format!(
                "{} exited with {}: {}",
                self.program,
                result.status,
                String::from_utf8_lossy(&result.stderr)
            )))
        }
    }
}

#[cfg(test)]
mod test_bootgen {
    use crate::hardware::ImageConverter;
    use crate::hardware::bootgen::BootgenConverter;
    use googletest::prelude::*;
    use rstest::*;
    use std::path::Path;

    #[gtest]
    #[rstest]
    #[case::not_installed(
        "bootgen-that-is-not-installed",
        err(displays_as(contains_substring("failed to run")))
    )]
    #[case::non_zero_exit("false", err(displays_as(contains_substring("exited with"))))]
    #[case::success("true", ok(anything()))]
    fn convert<M: for<'a> Matcher<&'a std::result::Result<(), crate::error::MaglevdError>>>(
        #[case] program: &str,
        #[case] condition: M,
    ) {
        let converter = BootgenConverter::new(program, "zynq");
        let result = converter.convert(Path::new("/tmp/x.bif"), Path::new("/tmp/x.bin"));
        assert_that!(&result, condition);
    }
}
