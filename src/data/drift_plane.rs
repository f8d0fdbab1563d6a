// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The output of the de-Doppler transform: integrated power and accumulated
//! RFI flags over a (drift rate × frequency) grid.

use ndarray::ArcArray2;

use super::{Device, ScanError};

/// Metadata for one drift trajectory searched during integration.
#[derive(Debug, Clone, PartialEq)]
pub struct DriftRate {
    /// The row index in the drift plane.
    pub index_in_plane: usize,

    /// The slope in frequency bins per time step.
    pub slope: f64,

    /// The physical drift rate \[Hz/s\].
    pub rate_hz_per_sec: f64,

    /// Total frequency bins crossed over the full integration. Signed:
    /// negative for drifts toward lower bin indices.
    pub channel_span: i64,

    /// The number of bins integrated per step to capture a signal that
    /// crosses more than one bin per step. Always at least 1.
    pub desmear_bins: usize,
}

/// Per-path counts of flagged samples encountered during integration, one
/// counter grid per flag family.
///
/// Unlike the time × frequency input mask, these live on the
/// drift × frequency grid of the plane.
#[derive(Debug, Clone)]
pub struct IntegratedFlags {
    pub low_spectral_kurtosis: ArcArray2<u32>,
    pub high_spectral_kurtosis: ArcArray2<u32>,
    pub sigma_clip: ArcArray2<u32>,
}

impl IntegratedFlags {
    /// Zeroed counters for a `drifts` × `channels` plane.
    pub fn zeros(drifts: usize, channels: usize) -> IntegratedFlags {
        IntegratedFlags {
            low_spectral_kurtosis: ArcArray2::zeros((drifts, channels)),
            high_spectral_kurtosis: ArcArray2::zeros((drifts, channels)),
            sigma_clip: ArcArray2::zeros((drifts, channels)),
        }
    }
}

/// The integrated drift plane for one coarse channel.
///
/// Cloning is cheap: the tensors are shared handles, so a clone taken by a
/// hit-search producer references the memoised storage.
#[derive(Debug, Clone)]
pub struct FrequencyDriftPlane {
    /// Slow-time steps summed into every cell of the plane.
    integration_steps: i64,

    /// One entry per row of the plane, in row order.
    drift_rate_info: Vec<DriftRate>,

    /// Integrated power, shape (drift rates × frequency).
    plane: ArcArray2<f32>,

    /// Flagged-sample counts along every integration path.
    flags: IntegratedFlags,

    device: Device,
}

impl FrequencyDriftPlane {
    pub fn new(
        plane: ArcArray2<f32>,
        flags: IntegratedFlags,
        integration_steps: i64,
        drift_rate_info: Vec<DriftRate>,
    ) -> FrequencyDriftPlane {
        FrequencyDriftPlane {
            integration_steps,
            drift_rate_info,
            plane,
            flags,
            device: Device::default(),
        }
    }

    /// The number of time steps summed to form this plane.
    pub fn integration_steps(&self) -> i64 {
        self.integration_steps
    }

    /// Metadata for every drift rate present, in row order.
    pub fn drift_rate_info(&self) -> &[DriftRate] {
        &self.drift_rate_info
    }

    /// The integrated power values.
    pub fn plane(&self) -> &ArcArray2<f32> {
        &self.plane
    }

    /// The accumulated RFI flag counters.
    pub fn integrated_rfi(&self) -> &IntegratedFlags {
        &self.flags
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn set_device(&mut self, device: Device) -> Result<(), ScanError> {
        device.validate()?;
        self.device = device;
        Ok(())
    }

    /// Migrate the plane and flag counters to the configured device now.
    pub fn push_device(&mut self) -> Result<(), ScanError> {
        self.device.validate()
    }
}
