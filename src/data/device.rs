// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Compute-device placement for channel tensors.
//!
//! Setting a device records intent; tensors migrate on the next access or an
//! explicit `push_device`. This build carries no GPU backend, so selecting a
//! CUDA device fails immediately rather than at first kernel launch.

use std::fmt;
use std::str::FromStr;

use super::ScanError;

/// Where a channel's tensors should live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Cuda(i32),
}

impl Default for Device {
    fn default() -> Device {
        Device::Cpu
    }
}

impl Device {
    /// Check that this device can actually be used by this build.
    pub(crate) fn validate(self) -> Result<(), ScanError> {
        match self {
            Device::Cpu => Ok(()),
            Device::Cuda(_) => Err(ScanError::UnsupportedDevice(self.to_string())),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(id) => write!(f, "cuda:{id}"),
        }
    }
}

impl FromStr for Device {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Device, ScanError> {
        match s.trim() {
            "cpu" => Ok(Device::Cpu),
            "cuda" => Ok(Device::Cuda(0)),
            other => match other.strip_prefix("cuda:").map(str::parse) {
                Some(Ok(id)) => Ok(Device::Cuda(id)),
                _ => Err(ScanError::UnsupportedDevice(other.to_string())),
            },
        }
    }
}
