// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The de-Doppler transform: integrate the waterfall along every hypothesised
//! linear drift trajectory, producing the (drift rate × frequency) search
//! volume and the per-path RFI counts alongside it.

mod cpu;
mod error;
mod tensor;

pub use error::DriftError;

use log::info;
use ndarray::prelude::*;

use crate::data::{
    Cadence, CoarseChannel, DriftRate, FrequencyDriftPlane, ObservationTarget, Scan, ScanError,
};

/// Which integration kernel to run. Both kernels share the geometry from
/// [`compute_drifts`] and produce identical channel spans; their power sums
/// agree within float rounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DriftKernel {
    /// Scalar accumulation, parallelised over drift rows.
    #[default]
    Cpu,

    /// Whole-row tensor arithmetic; the fallback shape used where a device
    /// library provides the element-wise ops.
    Tensor,
}

/// Configuration for the drift integration.
#[derive(Debug, Clone, Copy)]
pub struct IntegrateDriftsOptions {
    /// Integrate over a widened footprint when a trajectory crosses more
    /// than one bin per step, preserving per-path noise statistics.
    pub desmear: bool,

    /// The lowest drift rate to search \[Hz/s\].
    pub low_rate_hz_per_sec: f64,

    /// The highest drift rate to search \[Hz/s\].
    pub high_rate_hz_per_sec: f64,

    /// Search step in units of the unit drift resolution (one channel over
    /// the full scan duration).
    pub resolution: i64,

    pub kernel: DriftKernel,
}

impl Default for IntegrateDriftsOptions {
    fn default() -> IntegrateDriftsOptions {
        IntegrateDriftsOptions {
            desmear: true,
            low_rate_hz_per_sec: -5.0,
            high_rate_hz_per_sec: 5.0,
            resolution: 1,
            kernel: DriftKernel::Cpu,
        }
    }
}

/// Convert the requested physical drift range into the grid geometry of
/// every trajectory to be summed: row index, slope in bins per step, total
/// channel span, and the desmearing width.
///
/// The bounds are rounded to multiples of the unit drift resolution
/// `foff_Hz / ((ntsteps - 1) · tsamp)`, and the row count is the inclusive
/// span `round((high − low) / step) + 1`, so the zero rate is always on the
/// grid when the bounds straddle it.
pub fn compute_drifts(
    time_steps: i64,
    foff: f64,
    tsamp: f64,
    options: &IntegrateDriftsOptions,
) -> Result<Vec<DriftRate>, DriftError> {
    if time_steps < 2 {
        return Err(DriftError::InvalidTimeSpan {
            ntsteps: time_steps,
        });
    }
    let maximum_drift_time_span = (time_steps - 1) as f64;

    let foff_hz = foff * 1e6;
    let unit_drift_resolution = foff_hz / (maximum_drift_time_span * tsamp);

    let search_step = (unit_drift_resolution * options.resolution as f64).abs();
    let rounded_low = (options.low_rate_hz_per_sec / unit_drift_resolution).round_ties_even()
        * unit_drift_resolution;
    let rounded_high = (options.high_rate_hz_per_sec / unit_drift_resolution).round_ties_even()
        * unit_drift_resolution;

    let number_drifts = ((rounded_high - rounded_low) / search_step).abs().round() as usize + 1;
    info!(
        "Searching {number_drifts} drift rates from {} Hz/sec to {} Hz/sec in increments of \
         {search_step} Hz/sec",
        rounded_low.min(rounded_high),
        rounded_low.max(rounded_high)
    );

    let start = rounded_low.min(rounded_high);
    let mut drift_rate_info = Vec::with_capacity(number_drifts);
    for index in 0..number_drifts {
        let rate_hz_per_sec = start + index as f64 * search_step;

        let channel_span =
            (rate_hz_per_sec * maximum_drift_time_span * tsamp / foff_hz).round_ties_even() as i64;
        let slope = channel_span as f64 / maximum_drift_time_span;

        let desmear_bins = if options.desmear {
            (slope.abs().round_ties_even() as usize).max(1)
        } else {
            1
        };

        drift_rate_info.push(DriftRate {
            index_in_plane: index,
            slope,
            rate_hz_per_sec,
            channel_span,
            desmear_bins,
        });
    }
    Ok(drift_rate_info)
}

/// The frequency-bin offset of a trajectory at every time step, and the
/// extra offsets its desmearing footprint reaches. Shared by both kernels so
/// their integer geometry is identical.
pub(crate) struct TrajectoryGeometry {
    /// `round(slope · t)` for every step `t`.
    pub(crate) offsets: Vec<i64>,

    /// The direction desmeared bins extend in: the sign of the slope.
    pub(crate) direction: i64,

    /// First frequency bin whose whole footprint is in bounds.
    pub(crate) f_lo: i64,

    /// One past the last in-bounds frequency bin.
    pub(crate) f_hi: i64,
}

pub(crate) fn trajectory_geometry(
    rate: &DriftRate,
    time_steps: usize,
    num_channels: usize,
) -> TrajectoryGeometry {
    let offsets: Vec<i64> = (0..time_steps)
        .map(|t| (rate.slope * t as f64).round_ties_even() as i64)
        .collect();
    let direction: i64 = if rate.slope < 0.0 { -1 } else { 1 };

    // Cells whose trajectory would leave the band are excluded outright, so
    // find the extreme offsets the footprint reaches.
    let desmear = rate.desmear_bins as i64;
    let mut min_reach = i64::MAX;
    let mut max_reach = i64::MIN;
    for &offset in &offsets {
        for j in 0..desmear {
            let reach = offset + j * direction;
            min_reach = min_reach.min(reach);
            max_reach = max_reach.max(reach);
        }
    }

    let num_channels = num_channels as i64;
    let f_lo = 0.max(-min_reach);
    let f_hi = num_channels.min(num_channels - max_reach);
    TrajectoryGeometry {
        offsets,
        direction,
        f_lo,
        f_hi,
    }
}

/// Integrate a waterfall and its mask over the given trajectories.
pub fn integrate_drift_plane(
    data: ArrayView2<f32>,
    mask: ArrayView2<u8>,
    drifts: Vec<DriftRate>,
    options: &IntegrateDriftsOptions,
) -> Result<FrequencyDriftPlane, DriftError> {
    if data.shape() != mask.shape() {
        return Err(DriftError::InconsistentShape {
            data: data.shape().to_vec(),
            mask: mask.shape().to_vec(),
        });
    }
    match options.kernel {
        DriftKernel::Cpu => cpu::integrate_linear_rounded_bins(data, mask, drifts),
        DriftKernel::Tensor => tensor::integrate_linear_rounded_bins(data, mask, drifts),
    }
}

/// Register a drift-plane producer on a coarse channel. The integration
/// kernel itself runs on the first read of the plane.
pub fn integrate_drifts_channel(
    cc: &mut CoarseChannel,
    options: IntegrateDriftsOptions,
) -> Result<(), DriftError> {
    let drifts = compute_drifts(cc.ntsteps(), cc.foff(), cc.tsamp(), &options)?;
    let data = cc.data()?;
    let mask = cc.mask()?;

    cc.set_integrated_drift_plane_producer(Box::new(move || {
        integrate_drift_plane(data.view(), mask.view(), drifts, &options).map_err(|e| {
            ScanError::Stage {
                description: "integrate drifts".to_string(),
                message: e.to_string(),
            }
        })
    }));
    Ok(())
}

/// Register drift integration on a scan's channel pipeline.
pub fn integrate_drifts(mut scan: Scan, options: IntegrateDriftsOptions) -> Scan {
    scan.add_coarse_channel_transform(
        move |cc| {
            integrate_drifts_channel(cc, options).map_err(|e| match e {
                DriftError::Scan(e) => e,
                other => ScanError::Stage {
                    description: "integrate drifts".to_string(),
                    message: other.to_string(),
                },
            })
        },
        "integrate drifts",
    );
    scan
}

pub fn integrate_drifts_target(
    mut target: ObservationTarget,
    options: IntegrateDriftsOptions,
) -> ObservationTarget {
    target.scans = target
        .scans
        .into_iter()
        .map(|scan| integrate_drifts(scan, options))
        .collect();
    target
}

pub fn integrate_drifts_cadence(
    mut cadence: Cadence,
    options: IntegrateDriftsOptions,
) -> Cadence {
    cadence.targets = cadence
        .targets
        .into_iter()
        .map(|target| integrate_drifts_target(target, options))
        .collect();
    cadence
}
